//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Expand a leading `~` against `home`. Other paths pass through untouched.
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Home directory of the user who invoked osg.
///
/// Under `sudo` this is the home of `SUDO_USER`, so privileged cleanup and
/// relocation act on the desktop user's directories rather than root's.
pub fn invoking_user_home() -> PathBuf {
    invoking_user_home_from(|name| env::var_os(name).map(PathBuf::from))
}

fn invoking_user_home_from<F>(mut lookup: F) -> PathBuf
where
    F: FnMut(&str) -> Option<PathBuf>,
{
    #[cfg(unix)]
    if let Some(sudo_user) = lookup("SUDO_USER")
        && let Some(name) = sudo_user.to_str()
        && name != "root"
        && let Ok(Some(user)) = nix::unistd::User::from_name(name)
    {
        return user.dir;
    }

    lookup("HOME").unwrap_or_else(|| {
        eprintln!("[OSG-CONFIG] WARNING: HOME not set, falling back to /root");
        PathBuf::from("/root")
    })
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn normalizes_nonexistent_path_syntactically() {
        let input = Path::new("/nonexistent_osg/foo/../bar");
        assert!(std::fs::canonicalize(input).is_err());
        assert_eq!(
            resolve_absolute_path(input),
            PathBuf::from("/nonexistent_osg/bar")
        );
    }

    #[test]
    fn handles_parent_at_root() {
        assert_eq!(normalize_syntactic(Path::new("/../foo")), Path::new("/foo"));
    }

    #[test]
    fn expands_tilde_prefix_only() {
        let home = Path::new("/home/live");
        assert_eq!(
            expand_home(Path::new("~/Downloads"), home),
            PathBuf::from("/home/live/Downloads")
        );
        assert_eq!(expand_home(Path::new("~"), home), PathBuf::from("/home/live"));
        assert_eq!(
            expand_home(Path::new("/var/cache/~x"), home),
            PathBuf::from("/var/cache/~x")
        );
        assert_eq!(
            expand_home(Path::new("~other/x"), home),
            PathBuf::from("~other/x")
        );
    }

    #[test]
    fn home_falls_back_to_env_home_without_sudo() {
        let home = invoking_user_home_from(|name| match name {
            "HOME" => Some(PathBuf::from("/home/tester")),
            _ => None,
        });
        assert_eq!(home, PathBuf::from("/home/tester"));
    }

    #[test]
    fn sudo_root_uses_env_home() {
        let home = invoking_user_home_from(|name| match name {
            "SUDO_USER" => Some(PathBuf::from("root")),
            "HOME" => Some(PathBuf::from("/root")),
            _ => None,
        });
        assert_eq!(home, PathBuf::from("/root"));
    }
}
