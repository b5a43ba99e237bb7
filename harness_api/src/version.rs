//! Checks tying the Debian package versions of the build output to the
//! upstream versions of the components they were built from.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AssertionError, HarnessError};

/// Upstream version name used for packages built from the development branch.
pub const MASTER_VERSION: &str = "master";

lazy_static! {
    /// Development builds look like `0.0~git20191022.dade697-1+b279517265`,
    /// where the build number is `LOCAL` for builds outside of CI.
    static ref MASTER_DEB_VERSION: Regex =
        Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+~git[0-9]+\.([a-z0-9]+)-1\+b([0-9]+|LOCAL)")
            .unwrap();

    /// Older add-on builds carry no build number.
    static ref MASTER_ADDON_DEB_VERSION: Regex =
        Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+~git[0-9]+\.([a-z0-9]+)-1").unwrap();
}

/// Verify that `deb_version` is the package version expected for upstream
/// `version`.
pub fn verify_package_version(version: &str, deb_version: &str) -> Result<(), HarnessError> {
    let matches = if version == MASTER_VERSION {
        MASTER_DEB_VERSION.is_match(deb_version)
    } else {
        deb_version == format!("{version}-1")
    };

    if matches {
        Ok(())
    } else {
        Err(HarnessError::new(AssertionError::VersionMismatch {
            version: version.into(),
            deb_version: deb_version.into(),
        }))
    }
}

/// Extract the short git hash of a development build, if `deb_version` is one.
pub fn master_short_hash(deb_version: &str) -> Option<&str> {
    MASTER_ADDON_DEB_VERSION
        .captures(deb_version)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Whether `deb_version` is the version of a development build.
pub fn is_master_build(deb_version: &str) -> bool {
    master_short_hash(deb_version).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_release_version() {
        verify_package_version("4.0.0", "4.0.0-1").unwrap();
        verify_package_version("4.0.0", "4.0.0-2").unwrap_err();
        verify_package_version("4.0.0", "4.0.1-1").unwrap_err();
    }

    #[test]
    fn test_verify_master_version() {
        verify_package_version("master", "0.0~git20191022.dade697-1+b279517265").unwrap();
        verify_package_version("master", "0.0~git20191022.dade697-1+bLOCAL").unwrap();

        let error = verify_package_version("master", "4.0.0-1").unwrap_err();
        assert_eq!(
            format!("{}", error.kind()),
            "Package version '4.0.0-1' does not match 'master'"
        );
        verify_package_version("master", "0.0~git20191022.dade697-1").unwrap_err();
    }

    #[test]
    fn test_master_short_hash() {
        assert_eq!(
            master_short_hash("0.0~git20191022.dade697-1"),
            Some("dade697")
        );
        assert_eq!(
            master_short_hash("1.2.3~git20240101.abc123f-1+b42"),
            Some("abc123f")
        );
        assert_eq!(master_short_hash("2.2.0-1"), None);
        assert!(!is_master_build("2.2.0-1+debian+buster"));
    }
}
