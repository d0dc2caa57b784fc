use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// Stored as `user` by the account store; `broker` is accepted too.
    #[serde(alias = "user")]
    Broker,
}

impl Role {
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Broker => "broker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "broker" | "user" => Ok(Self::Broker),
            other => Err(format!("unsupported role `{other}` (expected admin|broker)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

/// Authenticated caller. Read-only for the duration of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
    pub role: Role,
    pub external_owner_id: Option<String>,
}

impl Principal {
    pub fn identity(&self) -> Identity {
        resolve(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    pub external_owner_id: Option<String>,
}

/// Maps a principal to the role and CRM owner id used for data scoping.
/// Blank owner ids resolve to `None`.
pub fn resolve(principal: &Principal) -> Identity {
    let external_owner_id = principal
        .external_owner_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    Identity { role: principal.role, external_owner_id }
}

/// Account row as delivered by the hosting auth layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub ghl_user_id: Option<String>,
    /// Older rows carry the CRM user id here instead of `ghl_user_id`.
    #[serde(default)]
    pub user_type: Option<String>,
}

impl From<UserProfile> for Principal {
    fn from(profile: UserProfile) -> Self {
        let owner = |value: Option<String>| value.filter(|id| !id.trim().is_empty());
        let external_owner_id = owner(profile.ghl_user_id).or_else(|| owner(profile.user_type));
        let display_name = if profile.full_name.trim().is_empty() {
            profile.email.unwrap_or_else(|| profile.id.clone())
        } else {
            profile.full_name
        };

        Self { id: PrincipalId(profile.id), display_name, role: profile.role, external_owner_id }
    }
}
