//! Windows cloud-init validation for server `user_data`

use serde::Deserialize;
use thiserror::Error;

const HEADER: &str = "#cloud-config";

#[derive(Debug, Error)]
pub enum CloudInitError {
    #[error("cloud-init must start with {HEADER}")]
    MissingHeader,

    #[error("password should not be enclosed in double quotes")]
    QuotedPassword,

    #[error("invalid YAML structure: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("no users defined in cloud-init")]
    NoUsers,

    #[error("user entry missing 'name' field")]
    MissingName,

    #[error("user '{0}' missing 'passwd' field")]
    MissingPassword(String),

    #[error("user '{0}' has an invalid password format")]
    InvalidPassword(String),
}

#[derive(Debug, Deserialize)]
struct WindowsUserCloudInit {
    #[serde(default)]
    users: Vec<WindowsUser>,
}

#[derive(Debug, Deserialize)]
struct WindowsUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    passwd: Option<serde_yaml::Value>,
}

/// Whether the payload is a cloud-config document
pub fn is_windows_cloud_init(data: &str) -> bool {
    data.trim().starts_with(HEADER)
}

/// Check a Windows cloud-config for the user mistakes the image rejects
pub fn validate_windows_cloud_init(data: &str) -> Result<(), CloudInitError> {
    if !is_windows_cloud_init(data) {
        return Err(CloudInitError::MissingHeader);
    }

    for line in data.lines() {
        if let Some((_, value)) = line.split_once("passwd:") {
            let value = value.trim();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                return Err(CloudInitError::QuotedPassword);
            }
        }
    }

    let body = data.trim_start().trim_start_matches(HEADER);
    let config: WindowsUserCloudInit = serde_yaml::from_str(body)?;

    if config.users.is_empty() {
        return Err(CloudInitError::NoUsers);
    }

    for user in &config.users {
        if user.name.is_empty() {
            return Err(CloudInitError::MissingName);
        }
        match &user.passwd {
            None | Some(serde_yaml::Value::Null) => {
                return Err(CloudInitError::MissingPassword(user.name.clone()));
            }
            Some(serde_yaml::Value::String(_)) => {}
            Some(_) => return Err(CloudInitError::InvalidPassword(user.name.clone())),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "#cloud-config\nusers:\n  - name: Administrator\n    groups: Administrators\n    passwd: S3cr3t!pass\n";

    #[test]
    fn accepts_single_user() {
        assert!(is_windows_cloud_init(VALID));
        validate_windows_cloud_init(VALID).unwrap();
    }

    #[test]
    fn header_may_follow_whitespace() {
        assert!(is_windows_cloud_init("\n  #cloud-config\n"));
        assert!(!is_windows_cloud_init("#!/bin/bash\necho hi"));
    }

    #[test]
    fn rejects_missing_header() {
        let err = validate_windows_cloud_init("users:\n  - name: a\n    passwd: b\n").unwrap_err();
        assert!(matches!(err, CloudInitError::MissingHeader));
    }

    #[test]
    fn rejects_quoted_password() {
        let data = "#cloud-config\nusers:\n  - name: admin\n    passwd: \"secret\"\n";
        assert!(matches!(
            validate_windows_cloud_init(data),
            Err(CloudInitError::QuotedPassword)
        ));
    }

    #[test]
    fn rejects_quoted_password_on_list_item_line() {
        let data = "#cloud-config\nusers:\n  - passwd: \"secret\"\n    name: admin\n";
        assert!(matches!(
            validate_windows_cloud_init(data),
            Err(CloudInitError::QuotedPassword)
        ));
    }

    #[test]
    fn rejects_zero_users() {
        assert!(matches!(
            validate_windows_cloud_init("#cloud-config\nusers: []\n"),
            Err(CloudInitError::NoUsers)
        ));
        assert!(matches!(
            validate_windows_cloud_init("#cloud-config\nhostname: win\n"),
            Err(CloudInitError::NoUsers)
        ));
    }

    #[test]
    fn rejects_user_without_name() {
        let data = "#cloud-config\nusers:\n  - passwd: secret\n";
        assert!(matches!(
            validate_windows_cloud_init(data),
            Err(CloudInitError::MissingName)
        ));
    }

    #[test]
    fn rejects_missing_password() {
        let data = "#cloud-config\nusers:\n  - name: admin\n";
        let err = validate_windows_cloud_init(data).unwrap_err();
        assert_eq!(err.to_string(), "user 'admin' missing 'passwd' field");
    }

    #[test]
    fn rejects_non_string_password() {
        let data = "#cloud-config\nusers:\n  - name: admin\n    passwd: 12345\n";
        let err = validate_windows_cloud_init(data).unwrap_err();
        assert_eq!(err.to_string(), "user 'admin' has an invalid password format");
    }

    #[test]
    fn rejects_invalid_yaml() {
        let data = "#cloud-config\nusers: [\n";
        assert!(matches!(
            validate_windows_cloud_init(data),
            Err(CloudInitError::InvalidYaml(_))
        ));
    }
}
