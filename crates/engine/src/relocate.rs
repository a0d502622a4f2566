//! Post-restore relocation of Python virtual environments
//!
//! A venv captured at `/old/path` embeds that absolute path in shebang
//! lines, launcher stanzas and `VIRTUAL_ENV` assignments under `bin/`.
//! After extraction to a new location those references point nowhere, so
//! the relocator rewrites them to the new directory. Shell scripts and
//! shebang lines have no structured parser; the rewrites are an ordered
//! list of regex rules, each applied independently and gated on a match
//! test, so adding a rule never grows branching logic.

use crate::error::{Error, Result};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

/// Relative location of the interpreter that marks a directory as a venv
const INTERPRETER_PATH: &str = "bin/python";

/// How much of a file the default probe reads to decide text vs binary
const SNIFF_LEN: usize = 1024;

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("relocation pattern is valid")
}

// Leading shebang pointing at any python interpreter. `.` does not cross
// newlines, so only the first line can match.
static SHEBANG: LazyLock<Regex> = LazyLock::new(|| compile(r"^#!.*python"));

// Quote-triple relauncher stanza used by relocatable launcher scripts:
// `'''exec' /captured/path/bin/python "$0" "$@"`
static EXEC_RELAUNCH: LazyLock<Regex> = LazyLock::new(|| compile(r"'''exec' /[^\n ]*/bin/python "));

// `setenv VIRTUAL_ENV "<path>"` (csh-style, space-separated)
static VENV_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r#"VIRTUAL_ENV "[^"].*""#));

// `VIRTUAL_ENV="<path>"` (sh-style, equals-sign)
static VENV_EQUALS: LazyLock<Regex> = LazyLock::new(|| compile(r#"VIRTUAL_ENV="[^"].*""#));

fn render_shebang(target: &Path) -> String {
    format!("#!{}/bin/python", target.display())
}

fn render_exec_relaunch(target: &Path) -> String {
    format!("'''exec' {}/bin/python ", target.display())
}

fn render_venv_space(target: &Path) -> String {
    format!("VIRTUAL_ENV \"{}\"", target.display())
}

fn render_venv_equals(target: &Path) -> String {
    format!("VIRTUAL_ENV=\"{}\"", target.display())
}

/// The rewrite rule set, in application order
fn rules() -> [(&'static Regex, bool, fn(&Path) -> String); 4] {
    [
        (&SHEBANG, false, render_shebang as fn(&Path) -> String),
        (&EXEC_RELAUNCH, true, render_exec_relaunch),
        (&VENV_SPACE, false, render_venv_space),
        (&VENV_EQUALS, false, render_venv_equals),
    ]
}

/// Apply the rule set to one file's contents.
///
/// Returns `None` when nothing matched, so callers can leave the file
/// byte-for-byte untouched.
fn rewrite_contents(contents: &str, target: &Path) -> Option<String> {
    let mut text = contents.to_string();
    let mut changed = false;
    for (pattern, global, render) in rules() {
        if !pattern.is_match(&text) {
            continue;
        }
        // Target paths may contain `$`; NoExpand keeps them literal.
        let replacement = render(target);
        text = if global {
            pattern.replace_all(&text, NoExpand(&replacement)).into_owned()
        } else {
            pattern.replace(&text, NoExpand(&replacement)).into_owned()
        };
        changed = true;
    }
    changed.then_some(text)
}

/// Decides which files are text or scripts worth rewriting.
///
/// The relocator never parses binaries; this probe is its gate. Supply a
/// custom implementation to match an external `file(1)`-style classifier.
pub trait FileTypeProbe: Send + Sync {
    /// Whether `path` looks like a text or script file
    fn is_text_or_script(&self, path: &Path) -> std::io::Result<bool>;
}

/// Default probe: sniffs the head of the file.
///
/// A file qualifies when its first chunk is non-empty, NUL-free and valid
/// UTF-8 (allowing a multi-byte sequence cut off at the chunk boundary).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadSniffProbe;

impl FileTypeProbe for HeadSniffProbe {
    fn is_text_or_script(&self, path: &Path) -> std::io::Result<bool> {
        use std::io::Read;

        let mut file = fs::File::open(path)?;
        let mut buf = [0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let head = &buf[..filled];

        if head.is_empty() || head.contains(&0) {
            return Ok(false);
        }
        Ok(match std::str::from_utf8(head) {
            Ok(_) => true,
            // A multi-byte character truncated by the chunk boundary still
            // reads as text; anything else is binary.
            Err(e) => e.error_len().is_none(),
        })
    }
}

/// Rewrites captured absolute paths inside a restored virtual environment
pub struct EnvironmentRelocator {
    probe: Box<dyn FileTypeProbe>,
}

impl Default for EnvironmentRelocator {
    fn default() -> Self {
        Self::new(Box::new(HeadSniffProbe))
    }
}

impl EnvironmentRelocator {
    /// Create a relocator with a custom file-type probe
    #[must_use]
    pub fn new(probe: Box<dyn FileTypeProbe>) -> Self {
        Self { probe }
    }

    /// Rewrite interpreter references under `target_dir` to point at
    /// `target_dir` itself.
    ///
    /// Returns `Ok(false)` immediately, without scanning, when the
    /// directory has no interpreter at `bin/python`; returns `Ok(true)`
    /// iff at least one file was rewritten. Files with no matching rule
    /// are never written, so their metadata stays untouched. Symlinks are
    /// never followed or rewritten. Any read or write failure is fatal.
    pub fn maybe_fix(&self, target_dir: &Path) -> Result<bool> {
        if !target_dir.join(INTERPRETER_PATH).exists() {
            return Ok(false);
        }

        let bin_dir = target_dir.join("bin");
        let mut fixed = false;
        for entry in WalkDir::new(&bin_dir) {
            let entry = entry.map_err(|e| Error::relocation(e.into(), &bin_dir))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_text = self
                .probe
                .is_text_or_script(path)
                .map_err(|e| Error::relocation(e, path))?;
            if !is_text {
                continue;
            }

            let contents = fs::read_to_string(path).map_err(|e| Error::relocation(e, path))?;
            if let Some(updated) = rewrite_contents(&contents, target_dir) {
                // In-place truncating write keeps the file's permissions.
                fs::write(path, updated).map_err(|e| Error::relocation(e, path))?;
                debug!(path = %path.display(), "relocated interpreter references");
                fixed = true;
            }
        }
        Ok(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn mtime(path: &Path) -> SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    /// Lay down a minimal captured venv under `root` with the captured
    /// absolute prefix `old`.
    fn fake_venv(root: &Path, old: &str) {
        fs::create_dir_all(root.join("bin")).unwrap();
        // interpreter marker, deliberately binary so the probe skips it
        fs::write(root.join("bin/python"), [0x7f, b'E', b'L', b'F', 0, 0]).unwrap();
        fs::write(
            root.join("bin/wait_for_dns"),
            format!("#!{old}/bin/python\nimport sys\n"),
        )
        .unwrap();
        fs::write(
            root.join("bin/activate"),
            format!("deactivate () {{ :; }}\nVIRTUAL_ENV=\"{old}\"\nexport VIRTUAL_ENV\n"),
        )
        .unwrap();
        fs::write(
            root.join("bin/activate.csh"),
            format!("setenv VIRTUAL_ENV \"{old}\"\n"),
        )
        .unwrap();
        fs::write(
            root.join("bin/pip"),
            format!("#!/bin/sh\n'''exec' {old}/bin/python \"$0\" \"$@\"\n' '''\n"),
        )
        .unwrap();
    }

    #[test]
    fn directory_without_interpreter_is_left_alone() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bin")).unwrap();
        let script = temp.path().join("bin/tool");
        fs::write(&script, "#!/old/bin/python\n").unwrap();
        let before = mtime(&script);

        let relocator = EnvironmentRelocator::default();
        assert!(!relocator.maybe_fix(temp.path()).unwrap());
        assert_eq!(mtime(&script), before);
        assert_eq!(
            fs::read_to_string(&script).unwrap(),
            "#!/old/bin/python\n"
        );
    }

    #[test]
    fn shebang_is_rewritten_to_new_location() {
        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");

        let relocator = EnvironmentRelocator::default();
        assert!(relocator.maybe_fix(temp.path()).unwrap());

        let contents = fs::read_to_string(temp.path().join("bin/wait_for_dns")).unwrap();
        let first_line = contents.lines().next().unwrap();
        assert_eq!(
            first_line,
            format!("#!{}/bin/python", temp.path().display())
        );
    }

    #[test]
    fn exec_relaunch_stanza_is_rewritten() {
        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");

        EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap();

        let contents = fs::read_to_string(temp.path().join("bin/pip")).unwrap();
        assert!(contents.contains(&format!("'''exec' {}/bin/python ", temp.path().display())));
        assert!(!contents.contains("/old/path"));
    }

    #[test]
    fn both_virtual_env_variants_are_rewritten() {
        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");

        EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap();

        let sh = fs::read_to_string(temp.path().join("bin/activate")).unwrap();
        assert!(sh.contains(&format!("VIRTUAL_ENV=\"{}\"", temp.path().display())));

        let csh = fs::read_to_string(temp.path().join("bin/activate.csh")).unwrap();
        assert!(csh.contains(&format!("VIRTUAL_ENV \"{}\"", temp.path().display())));
    }

    #[test]
    fn files_with_no_match_keep_their_metadata() {
        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");
        let readme = temp.path().join("bin/notes.txt");
        fs::write(&readme, "no interpreter references here\n").unwrap();
        let before = mtime(&readme);

        assert!(EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap());
        assert_eq!(mtime(&readme), before);
    }

    #[test]
    fn binary_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");
        let blob = temp.path().join("bin/compiled");
        // mentions python but is binary; the probe must keep it out
        fs::write(&blob, b"\x00#!/old/path/bin/python\x00\x01\x02").unwrap();

        EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap();
        assert_eq!(
            fs::read(&blob).unwrap(),
            b"\x00#!/old/path/bin/python\x00\x01\x02"
        );
    }

    #[test]
    fn no_rewrite_means_false() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bin")).unwrap();
        fs::write(temp.path().join("bin/python"), [0u8, 1, 2]).unwrap();
        fs::write(temp.path().join("bin/plain.txt"), "nothing to do\n").unwrap();

        assert!(!EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_never_rewritten() {
        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");
        let real = temp.path().join("bin/wait_for_dns");
        let link = temp.path().join("bin/wait_for_dns_link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap();
        // the link is still a link, not a rewritten copy
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn rewrites_preserve_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        fake_venv(temp.path(), "/old/path");
        let script = temp.path().join("bin/wait_for_dns");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        EnvironmentRelocator::default()
            .maybe_fix(temp.path())
            .unwrap();
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn rewrite_contents_handles_dollar_signs_in_target() {
        // Paths with `$` must not be treated as capture group references
        let target = Path::new("/ci/$build/workspace");
        let updated = rewrite_contents("#!/old/bin/python\n", target).unwrap();
        assert_eq!(updated, "#!/ci/$build/workspace/bin/python\n");
    }
}
