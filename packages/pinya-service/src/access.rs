use crate::{Error, PinyaService, Result};
use pinya_domain::access::{self, AccessDenied, Requester, RoleKind};

impl PinyaService {
	/// Checks the role against the settings as they are right now.
	pub fn require_role(&self, requester: &Requester, role: RoleKind) -> Result<()> {
		let configured = self.settings.get(role.setting_key());

		access::check_role(configured.as_deref(), requester, role).map_err(denied_to_error)
	}
}

pub(crate) fn denied_to_error(denied: AccessDenied) -> Error {
	let message = denied.message();

	match denied {
		AccessDenied::NotConfigured { .. } | AccessDenied::InvalidConfiguration { .. } =>
			Error::ConfigurationMissing { message },
		AccessDenied::MissingRole { .. } => Error::Forbidden { message },
	}
}
