//! Values the Kubernetes API accepts for security-context enum fields.

/// Accepted `fsGroupChangePolicy` values.
pub const FS_GROUP_CHANGE_POLICIES: &[&str] = &["OnRootMismatch", "Always"];

/// Seccomp profile type that requires a `localhostProfile` path.
pub const SECCOMP_LOCALHOST: &str = "Localhost";

/// Accepted `seccompProfile.type` values.
pub const SECCOMP_PROFILE_TYPES: &[&str] = &["RuntimeDefault", SECCOMP_LOCALHOST, "Unconfined"];

/// Accepted `procMount` values.
pub const PROC_MOUNT_TYPES: &[&str] = &["Default", "Unmasked"];

/// Max length of a DNS-1123 label (names and namespaces).
pub const MAX_NAME_LENGTH: usize = 63;
