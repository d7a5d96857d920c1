//! Registry queries performed through the registry client (`skopeo`).

use log::debug;
use serde::Deserialize;

use crate::args::{self, REGISTRY_CLIENT};
use crate::error::{Error, Result};
use crate::exec::CommandRunner;

/// Fragments of registry-client stderr that mean "the image is not there",
/// as opposed to "the registry could not be asked".
const NOT_FOUND_MARKERS: &[&str] = &[
    "manifest unknown",
    "name unknown",
    "not found",
    "NotFound",
    "MANIFEST_UNKNOWN",
];

/// The one field of `skopeo inspect` output we care about.
#[derive(Debug, Deserialize)]
struct InspectOutput {
    #[serde(rename = "Digest")]
    digest: String,
}

/// Checks whether `image_url` already exists in the registry.
///
/// Returns `Ok(false)` when the registry answered that the manifest is
/// missing, and an error when the check itself failed (spawn failure,
/// authentication or network problems). Callers decide how to treat the
/// error.
pub fn image_exists(runner: &dyn CommandRunner, image_url: &str, tls_verify: bool) -> Result<bool> {
    let cmd = args::exists_command(image_url, tls_verify);
    let output = runner.invoke(REGISTRY_CLIENT, &cmd)?;

    if output.success() {
        return Ok(true);
    }

    if NOT_FOUND_MARKERS.iter().any(|m| output.stderr.contains(m)) {
        debug!("Image {} not present in registry", image_url);
        return Ok(false);
    }

    Err(Error::ExternalTool {
        tool: REGISTRY_CLIENT.to_string(),
        args: cmd,
        status: output.status,
        stderr: output.stderr,
    })
}

/// Resolves the content digest of `image_url`.
///
/// Malformed inspect output is reported as `Error::Parse`.
pub fn image_digest(runner: &dyn CommandRunner, image_url: &str, tls_verify: bool) -> Result<String> {
    let cmd = args::inspect_command(image_url, tls_verify);
    let stdout = runner.run_with_output(REGISTRY_CLIENT, &cmd)?;
    parse_digest(&stdout)
}

/// Extracts the `Digest` field from `skopeo inspect` JSON.
pub fn parse_digest(json: &str) -> Result<String> {
    let parsed: InspectOutput = serde_json::from_str(json).map_err(|e| Error::Parse {
        tool: REGISTRY_CLIENT.to_string(),
        message: e.to_string(),
    })?;

    if parsed.digest.is_empty() {
        return Err(Error::Parse {
            tool: REGISTRY_CLIENT.to_string(),
            message: "digest is empty".to_string(),
        });
    }
    Ok(parsed.digest)
}

/// Splits `repo@algorithm:hex` into its repository and digest parts.
///
/// Returns `None` for references without exactly one non-empty `@` split.
pub fn split_digest_reference(reference: &str) -> Option<(&str, &str)> {
    let (repo, digest) = reference.split_once('@')?;
    if repo.is_empty() || digest.is_empty() || digest.contains('@') {
        return None;
    }
    Some((repo, digest))
}
