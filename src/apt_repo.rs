//! Local APT repositories in the target, so that upgrades go through `apt`
//! exactly like they would from the upstream repository.

use std::path::{Path, PathBuf};

use log::{debug, info};

use harness_api::{
    config::TestConfig,
    constants::{
        APT_SOURCES_LIST_DIR, BUILT_PACKAGES_TARGET_PATH, OPENSOURCE_PACKAGES_DIR,
        UPSTREAM_POOL_URL, UPSTREAM_TEST_POOL_URL,
    },
    error::{HarnessError, HarnessResultExt, InternalError, InvalidInputError, ReportError},
};
use osutils::{
    apt::Apt,
    connection::{quote, Connection},
};
use sysdefs::{arch::DebianArchitecture, distro::TargetPlatform};

/// Pool path of a released package, e.g.
/// `m/mender-client/mender-client_3.5.1-1+debian+buster_amd64.deb`.
pub fn pool_path(name: &str, version: &str, release: &str, arch: DebianArchitecture) -> String {
    format!(
        "{}/{name}/{}",
        pool_prefix(name),
        test_pool_path(name, version, release, arch)
    )
}

/// Path of a package in the flat pool of test packages, e.g.
/// `mender-client_4.0.0-1+debian+buster_amd64.deb`.
pub fn test_pool_path(
    name: &str,
    version: &str,
    release: &str,
    arch: DebianArchitecture,
) -> String {
    format!("{name}_{version}-1+debian+{release}_{arch}.deb")
}

/// Debian pools group source packages by their first letter, or by the first
/// four for libraries.
fn pool_prefix(name: &str) -> &str {
    let len = if name.starts_with("lib") { 4 } else { 1 };
    name.get(..len).unwrap_or(name)
}

/// Open source packages built for `platform`, sorted by path.
pub fn built_packages(
    config: &TestConfig,
    platform: &TargetPlatform,
) -> Result<Vec<PathBuf>, HarnessError> {
    let directory = config
        .packages_dir
        .join(OPENSOURCE_PACKAGES_DIR)
        .join(platform.directory_name());
    let pattern = directory.join("*.deb");
    let pattern = pattern
        .to_str()
        .structured(InternalError::Internal("Package path is not valid UTF-8"))?;

    let mut packages = glob::glob(pattern)
        .structured(InternalError::Internal("Invalid package glob pattern"))?
        .collect::<Result<Vec<_>, _>>()
        .structured(InvalidInputError::NoBuiltPackages {
            path: directory.display().to_string(),
        })?;
    packages.sort();

    if packages.is_empty() {
        return Err(HarnessError::new(InvalidInputError::NoBuiltPackages {
            path: directory.display().to_string(),
        }));
    }
    Ok(packages)
}

/// Copy every package built for the reference platform into `dest`.
pub fn put_all_built_packages(
    conn: &dyn Connection,
    config: &TestConfig,
    dest: &str,
) -> Result<(), HarnessError> {
    let packages = built_packages(config, &config.platform)?;
    conn.sudo(&format!("mkdir -p {}", quote(dest)))?;
    for package in &packages {
        conn.put(package, Some(dest))
            .message(format!("Failed to upload '{}'", package.display()))?;
    }
    debug!("Copied {} built package(s) to '{dest}'", packages.len());
    Ok(())
}

/// Turn the directory `path` of the target into a trusted APT source.
pub fn prepare_local_apt_repo(conn: &dyn Connection, path: &str) -> Result<(), HarnessError> {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .structured(InternalError::Internal("Repository path has no base name"))?;

    conn.sudo(&Apt::install(["dpkg-dev"]).to_string())?;
    conn.sudo(&format!(
        "cd {} && dpkg-scanpackages . /dev/null | gzip -9c > Packages.gz",
        quote(path)
    ))?;
    conn.sudo(&format!(
        "echo deb [trusted=yes] file:{path} ./ > {APT_SOURCES_LIST_DIR}/{name}.list"
    ))?;
    conn.sudo(&Apt::update().to_string())?;

    info!("Prepared local APT repository '{path}' on {}", conn.describe());
    Ok(())
}

/// Serve the freshly built packages from a local repository.
pub fn from_built_packages(conn: &dyn Connection, config: &TestConfig) -> Result<(), HarnessError> {
    put_all_built_packages(conn, config, BUILT_PACKAGES_TARGET_PATH)
        .message("Failed to copy built packages")?;
    prepare_local_apt_repo(conn, BUILT_PACKAGES_TARGET_PATH)
}

/// Serve released upstream packages from a local repository in `dest`.
pub fn from_upstream_packages(
    conn: &dyn Connection,
    pool_paths: &[String],
    dest: &str,
) -> Result<(), HarnessError> {
    download_into(conn, UPSTREAM_POOL_URL, pool_paths, dest)?;
    prepare_local_apt_repo(conn, dest)
}

/// Serve upstream test packages from a local repository in `dest`.
pub fn from_test_packages(
    conn: &dyn Connection,
    pool_paths: &[String],
    dest: &str,
) -> Result<(), HarnessError> {
    download_into(conn, UPSTREAM_TEST_POOL_URL, pool_paths, dest)?;
    prepare_local_apt_repo(conn, dest)
}

fn download_into(
    conn: &dyn Connection,
    pool_url: &str,
    pool_paths: &[String],
    dest: &str,
) -> Result<(), HarnessError> {
    conn.sudo(&format!("mkdir {}", quote(dest)))?;
    for path in pool_paths {
        conn.sudo(&format!(
            "cd {} && curl --remote-name {pool_url}{path}",
            quote(dest)
        ))
        .message(format!("Failed to download '{path}'"))?;
    }
    Ok(())
}
