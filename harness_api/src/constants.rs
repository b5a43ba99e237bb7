use std::time::Duration;

use const_format::formatcp;

// Script server constants

/// Address the script server binds to.
pub const SCRIPT_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Address the provisioned environment uses to reach the script server. The
/// containers run with host networking, so this is the host itself.
pub const SCRIPT_SERVER_CLIENT_ADDRESS: &str = "localhost";

/// Port the script server listens on.
pub const SCRIPT_SERVER_PORT: u16 = 8000;

/// Name of the installer script served by the script server.
pub const INSTALL_SCRIPT_NAME: &str = "install-mender.sh";

// Package layout constants

/// Default directory holding the built packages, relative to the working
/// directory.
pub const PACKAGES_DIR_DEFAULT: &str = "output";

/// Sub-directory of the packages directory for open source packages.
pub const OPENSOURCE_PACKAGES_DIR: &str = "opensource";

/// Sub-directory of the packages directory for commercial packages.
pub const COMMERCIAL_PACKAGES_DIR: &str = "commercial";

/// Debian release used as reference for the generic containers.
pub const DEBIAN_REF_DISTRO: &str = "buster";

/// Path in the target where freshly built packages are copied to.
pub const BUILT_PACKAGES_TARGET_PATH: &str = "/packages";

/// Root of the upstream APT repository.
pub const UPSTREAM_REPO_URL: &str = "https://downloads.mender.io/repos/debian/";

/// Pool of released upstream packages.
pub const UPSTREAM_POOL_URL: &str = formatcp!("{UPSTREAM_REPO_URL}pool/main/");

/// Pool of pre-release packages published for testing.
pub const UPSTREAM_TEST_POOL_URL: &str = formatcp!("{UPSTREAM_REPO_URL}pool/test-packages/");

/// Directory holding APT source lists in the target.
pub const APT_SOURCES_LIST_DIR: &str = "/etc/apt/sources.list.d";

// dpkg constants

/// Status reported by `dpkg --status` for a fully installed package.
pub const DPKG_STATUS_INSTALLED: &str = "install ok installed";

/// Status reported for a package that was removed but not purged.
pub const DPKG_STATUS_CONFIG_FILES: &str = "deinstall ok config-files";

/// Environment prefix that keeps apt and dpkg from prompting.
pub const NONINTERACTIVE_FRONTEND: &str = "DEBIAN_FRONTEND=noninteractive";

// Environment variables

/// Environment variable selecting the distribution release for package paths.
pub const DEBIAN_VERSION_NAME_ENV: &str = "DEBIAN_VERSION_NAME";

/// Environment variable selecting the distribution for package paths.
pub const DEBIAN_DISTRO_NAME_ENV: &str = "DEBIAN_DISTRO_NAME";

/// Environment variable selecting the architecture for package paths.
pub const DEBIAN_ARCH_ENV: &str = "DEBIAN_ARCH";

/// Environment variable pointing at a configuration file.
pub const CONFIG_PATH_ENV: &str = "DIST_TESTER_CONFIG";

// Raspbian device constants

/// Docker image running the emulated Raspberry Pi.
pub const RASPBIAN_IMAGE_DEFAULT: &str = "mender-dist-packages-tester";

/// Serial console line printed once the emulated board has booted.
pub const RASPBIAN_BOOT_BANNER: &str = "Raspbian GNU/Linux 9 raspberrypi ttyAMA0";

/// User to log in as on the emulated board.
pub const RASPBIAN_SSH_USER: &str = "pi";

/// Host port forwarded to the SSH port of the emulated board.
pub const RASPBIAN_SSH_PORT: u16 = 5555;

/// Key used to log in to the emulated board.
pub const RASPBIAN_SSH_KEY: &str = "docker-files/ssh-keys/key";

/// Hostname reported by `uname -a` on the emulated board.
pub const RASPBIAN_HOSTNAME: &str = "raspberrypi";

// Timeouts

/// How long to wait for the emulated board to boot.
pub const BOOT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// How often to look at the boot log.
pub const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long to keep trying to log in over SSH once the board has booted.
pub const SSH_LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between SSH login attempts.
pub const SSH_LOGIN_INTERVAL: Duration = Duration::from_secs(5);

/// SSH connect timeout, in seconds.
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 30;

/// How long to wait for the client to go through a full cycle: about two
/// minutes to generate device keys plus the poll interval.
pub const CLIENT_CYCLE_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Delay between journal reads while waiting for the client.
pub const CLIENT_CYCLE_POLL_INTERVAL: Duration = Duration::from_secs(10);

// Client constants

/// Configuration directory of the client.
pub const CLIENT_CONFIG_DIR: &str = "/etc/mender";

/// Main configuration file of the client.
pub const CLIENT_CONFIG_FILE: &str = formatcp!("{CLIENT_CONFIG_DIR}/mender.conf");

/// Configuration file of the remote terminal add-on.
pub const CONNECT_CONFIG_FILE: &str = formatcp!("{CLIENT_CONFIG_DIR}/mender-connect.conf");

/// Data directory of the client.
pub const CLIENT_DATA_DIR: &str = "/var/lib/mender";

/// Device type file of the client.
pub const DEVICE_TYPE_FILE: &str = formatcp!("{CLIENT_DATA_DIR}/device_type");

/// Update modules directory.
pub const UPDATE_MODULES_DIR: &str = "/usr/share/mender/modules/v3";

/// Inventory scripts directory.
pub const INVENTORY_DIR: &str = "/usr/share/mender/inventory";

/// Server URL configured by the default, non-interactive setup.
pub const HOSTED_SERVER_URL: &str = "https://hosted.mender.io";
