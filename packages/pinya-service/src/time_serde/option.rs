use serde::{Deserialize as _, Deserializer, Serializer};
use time::OffsetDateTime;

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(value) => super::serialize(value, serializer),
		None => serializer.serialize_none(),
	}
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(serde::Deserialize)]
	struct Wrapped(#[serde(with = "super")] OffsetDateTime);

	Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(value)| value))
}
