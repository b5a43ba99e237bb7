use std::{
    fmt::{self, Display},
    fs::{File, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use anyhow::{Context, Error};

/// Creates a file and all parent directories if they don't exist
pub fn create_file<S>(path: S) -> Result<File, Error>
where
    S: AsRef<Path>,
{
    if let Some(parent) = path.as_ref().parent() {
        create_dirs(parent)?;
    }

    std::fs::File::create(path.as_ref()).context(format!(
        "Could not create file: {}",
        path.as_ref().display()
    ))
}

/// Creates all directories in a path if they don't exist
pub fn create_dirs<S>(path: S) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    std::fs::create_dir_all(path.as_ref()).context(format!(
        "Could not create path: {}",
        path.as_ref().display()
    ))
}

/// Writes to a file, creating it and its parents, and sets the file mode
pub fn write_file<S>(path: S, mode: u32, contents: &[u8]) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    let mut file = create_file(path.as_ref())?;
    std::fs::set_permissions(path.as_ref(), Permissions::from_mode(mode)).context(format!(
        "Could not set permissions {:#o} for file {}",
        mode,
        path.as_ref().display()
    ))?;

    file.write_all(contents).context(format!(
        "Could not write to file: {}",
        path.as_ref().display()
    ))?;

    Ok(())
}

/// What a path in the target is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Executable,
    Directory,
    File,
    Symlink,
    /// Nothing at all at the path.
    Absent,
    /// Anything but an executable, including nothing.
    NotExecutable,
    /// Anything but a regular file, including nothing.
    NotFile,
}

impl FileKind {
    /// Operator of the `test` builtin checking for this kind.
    fn test_operator(&self) -> &'static str {
        match self {
            Self::Executable => "-x",
            Self::Directory => "-d",
            Self::File => "-f",
            Self::Symlink => "-h",
            Self::Absent => "! -e",
            Self::NotExecutable => "! -x",
            Self::NotFile => "! -f",
        }
    }
}

/// Expectation about a single path in the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExpectation {
    pub path: String,
    pub kind: FileKind,

    /// Expected contents, ignoring trailing newlines.
    pub contents: Option<String>,
}

impl FileExpectation {
    pub fn new(path: impl Into<String>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            contents: None,
        }
    }

    pub fn executable(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::Executable)
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::Directory)
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::File)
    }

    pub fn symlink(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::Symlink)
    }

    pub fn absent(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::Absent)
    }

    pub fn not_executable(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::NotExecutable)
    }

    pub fn not_file(path: impl Into<String>) -> Self {
        Self::new(path, FileKind::NotFile)
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    /// Shell command that succeeds if the path is of the expected kind.
    pub fn test_command(&self) -> String {
        format!("test {} {}", self.kind.test_operator(), self.path)
    }

    /// Shell command printing the contents to compare, if any are expected.
    pub fn contents_command(&self) -> Option<String> {
        self.contents.as_ref().map(|_| format!("cat {}", self.path))
    }

    /// Whether `actual` matches the expected contents. Always true when no
    /// contents are expected.
    pub fn contents_match(&self, actual: &str) -> bool {
        match self.contents {
            Some(ref expected) => expected.trim_end_matches('\n') == actual.trim_end_matches('\n'),
            None => true,
        }
    }
}

impl Display for FileExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.test_operator(), self.path)
    }
}
