use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use pinya_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("pinya_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads_and_normalizes_blank_tokens() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = pinya_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected sample config to load.");

	assert!(cfg.security.api_auth_token.is_none());
	assert!(cfg.security.admin_auth_token.is_none());
	assert!(cfg.notifications.webhook_url.is_none());
	assert_eq!(cfg.retrieval.top_k, 3);
}

#[test]
fn missing_optional_sections_fall_back_to_defaults() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root.as_table_mut().expect("Template config must be a table.");

	for section in ["retrieval", "translation", "answer", "presentation", "notifications"] {
		table.remove(section);
	}

	let cfg: Config = toml::from_str(&toml::to_string(&root).expect("Failed to render."))
		.expect("Failed to parse trimmed config.");

	assert!((cfg.retrieval.default_threshold - 0.5).abs() < f32::EPSILON);
	assert!((cfg.retrieval.duplicate_threshold - 0.9).abs() < f32::EPSILON);
	assert_eq!(cfg.translation.on_failure, "passthrough");
	assert_eq!(cfg.presentation.high_confidence, 45);
	assert_eq!(cfg.presentation.medium_confidence, 30);
	assert!(pinya_config::validate(&cfg).is_ok());
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let payload = sample_toml_with("providers.embedding", "dimensions", Value::Integer(768));
	let path = write_temp_config(payload);
	let result = pinya_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected dimension validation error.");

	assert!(
		err.to_string()
			.contains("providers.embedding.dimensions must match storage.postgres.vector_dim."),
		"Unexpected error: {err}"
	);
}

#[test]
fn thresholds_must_be_in_unit_range() {
	let mut cfg = base_config();

	cfg.retrieval.default_threshold = 0.0;

	let err = pinya_config::validate(&cfg).expect_err("Expected threshold validation error.");

	assert!(
		err.to_string().contains("retrieval.default_threshold must be in the range (0.0, 1.0]."),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.retrieval.duplicate_threshold = 1.5;

	let err = pinya_config::validate(&cfg).expect_err("Expected threshold validation error.");

	assert!(
		err.to_string().contains("retrieval.duplicate_threshold must be in the range (0.0, 1.0]."),
		"Unexpected error: {err}"
	);
}

#[test]
fn top_k_is_capped_at_three_results() {
	let mut cfg = base_config();

	cfg.retrieval.top_k = 3;

	assert!(pinya_config::validate(&cfg).is_ok());

	for top_k in [0, 4, 10] {
		cfg.retrieval.top_k = top_k;

		let err = pinya_config::validate(&cfg).expect_err("Expected top_k validation error.");

		assert!(
			err.to_string().contains("retrieval.top_k must be between 1 and 3."),
			"Unexpected error: {err}"
		);
	}

	let path = write_temp_config(sample_toml_with("retrieval", "top_k", Value::Integer(10)));
	let result = pinya_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn translation_failure_policy_is_restricted() {
	let mut cfg = base_config();

	cfg.translation.on_failure = "retry".to_string();

	let err = pinya_config::validate(&cfg).expect_err("Expected policy validation error.");

	assert!(matches!(err, Error::Validation { .. }));
	assert!(
		err.to_string().contains("translation.on_failure must be one of fail or passthrough."),
		"Unexpected error: {err}"
	);

	cfg.translation.on_failure = "fail".to_string();

	assert!(pinya_config::validate(&cfg).is_ok());
}

#[test]
fn confidence_cutoffs_must_be_ordered() {
	let mut cfg = base_config();

	cfg.presentation.medium_confidence = 45;

	let err = pinya_config::validate(&cfg).expect_err("Expected cut-off validation error.");

	assert!(
		err.to_string().contains(
			"presentation.medium_confidence must be less than presentation.high_confidence."
		),
		"Unexpected error: {err}"
	);
}

#[test]
fn provider_api_keys_must_be_present() {
	let payload = sample_toml_with("providers.llm", "api_key", Value::String("  ".to_string()));
	let path = write_temp_config(payload);
	let result = pinya_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected api key validation error.");

	assert!(
		err.to_string().contains("Provider llm api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn unreadable_path_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("pinya_config_test_missing_file.toml");

	let err = pinya_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
