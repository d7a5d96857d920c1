use std::path::Path;

use crate::error::{Error, Result};
use crate::exec::CommandRunner;

/// Program name of the version-control client.
pub const GIT: &str = "git";

/// Remote name used for the cloned source.
const REMOTE: &str = "origin";

/// `git init <target>`
pub fn init_args(target_dir: &Path) -> Vec<String> {
    vec!["init".to_string(), path_arg(target_dir)]
}

/// `git -C <target> remote add origin <url>`
pub fn remote_add_args(target_dir: &Path, url: &str) -> Vec<String> {
    let mut args = in_dir(target_dir);
    args.extend([
        "remote".to_string(),
        "add".to_string(),
        REMOTE.to_string(),
        url.to_string(),
    ]);
    args
}

/// `git -C <target> fetch [--depth=N] origin <refspec>`
///
/// A depth of zero fetches full history.
pub fn fetch_args(target_dir: &Path, refspec: &str, depth: u32) -> Vec<String> {
    let mut args = in_dir(target_dir);
    args.push("fetch".to_string());
    if depth > 0 {
        args.push(format!("--depth={}", depth));
    }
    args.push(REMOTE.to_string());
    args.push(refspec.to_string());
    args
}

/// `git -C <target> checkout --force --detach FETCH_HEAD`
pub fn checkout_args(target_dir: &Path) -> Vec<String> {
    let mut args = in_dir(target_dir);
    args.extend([
        "checkout".to_string(),
        "--force".to_string(),
        "--detach".to_string(),
        "FETCH_HEAD".to_string(),
    ]);
    args
}

/// `git -C <target> rev-parse HEAD`
pub fn rev_parse_args(target_dir: &Path) -> Vec<String> {
    let mut args = in_dir(target_dir);
    args.extend(["rev-parse".to_string(), "HEAD".to_string()]);
    args
}

/// `git -C <target> submodule update --init --recursive [--depth=N]`
pub fn submodule_args(target_dir: &Path, depth: u32) -> Vec<String> {
    let mut args = in_dir(target_dir);
    args.extend([
        "submodule".to_string(),
        "update".to_string(),
        "--init".to_string(),
        "--recursive".to_string(),
    ]);
    if depth > 0 {
        args.push(format!("--depth={}", depth));
    }
    args
}

/// Initialize an empty repository at `target_dir` pointing at `url`.
pub fn init(runner: &dyn CommandRunner, url: &str, target_dir: &Path) -> Result<()> {
    runner.run(GIT, &init_args(target_dir))?;
    runner.run(GIT, &remote_add_args(target_dir, url))
}

/// Fetch a single ref from the remote into `FETCH_HEAD`.
pub fn fetch(runner: &dyn CommandRunner, target_dir: &Path, refspec: &str, depth: u32) -> Result<()> {
    runner.run(GIT, &fetch_args(target_dir, refspec, depth))
}

/// Fetch `refspec` and check out the fetched commit.
pub fn fetch_and_checkout(
    runner: &dyn CommandRunner,
    target_dir: &Path,
    refspec: &str,
    depth: u32,
) -> Result<()> {
    fetch(runner, target_dir, refspec, depth)?;
    runner.run(GIT, &checkout_args(target_dir))
}

/// The full commit id currently checked out.
pub fn head_commit(runner: &dyn CommandRunner, target_dir: &Path) -> Result<String> {
    let stdout = runner.run_with_output(GIT, &rev_parse_args(target_dir))?;
    let sha = stdout.trim();
    if sha.is_empty() {
        return Err(Error::Parse {
            tool: GIT.to_string(),
            message: "rev-parse HEAD returned no commit".to_string(),
        });
    }
    Ok(sha.to_string())
}

/// Initialize and update all submodules recursively.
pub fn update_submodules(runner: &dyn CommandRunner, target_dir: &Path, depth: u32) -> Result<()> {
    runner.run(GIT, &submodule_args(target_dir, depth))
}

/// Provide a helpful hint for common auth failures in git stderr.
pub fn auth_hint(stderr: &str) -> Option<&'static str> {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
        || stderr.contains("could not read Username")
    {
        Some(
            "Authentication failed. Make sure the git auth workspace \
             (GIT_AUTH_PATH) contains .git-credentials or username/password files.",
        )
    } else {
        None
    }
}

fn in_dir(target_dir: &Path) -> Vec<String> {
    vec!["-C".to_string(), path_arg(target_dir)]
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
