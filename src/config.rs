//! Assembly of the test configuration: defaults, then the configuration
//! file, then the environment, then the command line.

use std::path::PathBuf;

use log::debug;

use harness_api::{config::TestConfig, constants::CONFIG_PATH_ENV, error::HarnessError};

use crate::cli::ConfigArgs;

/// Build the configuration of a run. `lookup` reads environment variables,
/// normally `std::env::var`.
pub fn load<F>(args: &ConfigArgs, lookup: F) -> Result<TestConfig, HarnessError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = args
        .config
        .clone()
        .or_else(|| lookup(CONFIG_PATH_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            debug!("Loading configuration from '{}'", path.display());
            TestConfig::load(&path)?
        }
        None => TestConfig::default(),
    };

    config.apply_env(&lookup)?;
    apply_args(&mut config, args)?;
    Ok(config)
}

fn apply_args(config: &mut TestConfig, args: &ConfigArgs) -> Result<(), HarnessError> {
    if let Some(ref version) = args.mender_client_version {
        config.versions.mender_client = Some(version.clone());
    }
    if let Some(ref version) = args.mender_connect_version {
        config.versions.mender_connect = Some(version.clone());
    }
    if let Some(ref version) = args.mender_configure_version {
        config.versions.mender_configure = Some(version.clone());
    }
    if let Some(ref version) = args.mender_client_deb_version {
        config
            .package_versions
            .insert("mender-client".into(), version.clone());
    }
    for entry in &args.package_versions {
        config.add_package_version(entry)?;
    }

    // The flag can only enable them
    config.commercial_tests |= args.commercial_tests;

    if let Some(ref dir) = args.packages_dir {
        config.packages_dir = dir.clone();
    }
    if let Some(ref dir) = args.script_dir {
        config.script_dir = dir.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use maplit::hashmap;
    use tempfile::NamedTempFile;

    use sysdefs::arch::DebianArchitecture;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = load(&ConfigArgs::default(), |_| None).unwrap();
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_precedence() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            indoc! {r#"
                versions:
                  mender-client: 3.5.0
                  mender-connect: 2.1.0
                package-versions:
                  mender-client: 3.5.0-1
                  mender-connect: 2.1.0-1
            "#},
        )
        .unwrap();

        let env = hashmap! {
            CONFIG_PATH_ENV => file.path().display().to_string(),
            "DEBIAN_ARCH" => "arm64".to_string(),
        };
        let args = ConfigArgs {
            mender_client_version: Some("4.0.0".into()),
            mender_client_deb_version: Some("4.0.0-1".into()),
            package_versions: vec!["mender-configure=1.1.0-1".into()],
            packages_dir: Some("/tmp/output".into()),
            ..Default::default()
        };
        let config = load(&args, |name| env.get(name).cloned()).unwrap();

        assert_eq!(config.versions.mender_client.as_deref(), Some("4.0.0"));
        assert_eq!(config.versions.mender_connect.as_deref(), Some("2.1.0"));
        assert_eq!(config.package_version("mender-client").unwrap(), "4.0.0-1");
        assert_eq!(config.package_version("mender-connect").unwrap(), "2.1.0-1");
        assert_eq!(config.package_version("mender-configure").unwrap(), "1.1.0-1");
        assert_eq!(
            config.device.platform.architecture,
            DebianArchitecture::Arm64
        );
        assert_eq!(config.packages_dir, PathBuf::from("/tmp/output"));
        assert!(!config.commercial_tests);
    }

    #[test]
    fn test_invalid_override() {
        let args = ConfigArgs {
            package_versions: vec!["mender-connect".into()],
            ..Default::default()
        };
        let error = load(&args, |_| None).unwrap_err();
        assert_eq!(
            error.kind().to_string(),
            "Invalid package version override 'mender-connect', expected NAME=VERSION"
        );
    }

    #[test]
    fn test_missing_file() {
        let args = ConfigArgs {
            config: Some("/nonexistent/dist-tester.yaml".into()),
            ..Default::default()
        };
        let error = load(&args, |_| None).unwrap_err();
        assert_eq!(<&str>::from(error.kind()), "initialization");
    }
}
