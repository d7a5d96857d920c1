//! # Argument Construction
//!
//! Pure mapping from build configuration to the argument vectors handed to
//! `buildah`, `skopeo` and the `unshare` rootless wrapper.
//!
//! Nothing in this module performs I/O or reads the clock on its own: the
//! current time is an explicit parameter, so the same inputs always produce
//! byte-identical vectors. That is what lets the orchestrators be tested by
//! comparing recorded command lines.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::duration::parse_duration;

/// Program name of the container build tool.
pub const BUILD_TOOL: &str = "buildah";
/// Program name of the registry client.
pub const REGISTRY_CLIENT: &str = "skopeo";
/// Program name of the namespace wrapper used for rootless builds.
pub const ROOTLESS_WRAPPER: &str = "unshare";

/// Transport prefix for registry references.
pub const DOCKER_TRANSPORT: &str = "docker://";
/// Where the prefetch directory is mounted inside hermetic builds.
pub const PREFETCH_MOUNT: &str = "/cachi2";
/// Label carrying the source commit.
pub const COMMIT_LABEL: &str = "io.konflux.commit";
/// Label carrying the expiration timestamp.
pub const EXPIRES_LABEL: &str = "quay.expires-after";
/// Number of retries the existence check allows the registry client.
pub const EXISTS_RETRY_TIMES: u32 = 3;

const TLS_VERIFY_DISABLED: &str = "--tls-verify=false";
/// The sub-id range remapped inside the user namespace: `<inside>,<outside>,<count>`.
const ID_MAP: &str = "1,1,65536";

/// Everything that shapes a `buildah build` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub image_url: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub hermetic: bool,
    pub prefetch_input: String,
    /// Host directory holding prefetched dependencies and the env file.
    pub prefetch_path: PathBuf,
    pub image_expires_after: String,
    pub commit_sha: String,
    pub build_args: Vec<String>,
    pub build_args_file: String,
    pub tls_verify: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            image_url: String::new(),
            dockerfile: PathBuf::from("./Dockerfile"),
            context: PathBuf::from("."),
            hermetic: false,
            prefetch_input: String::new(),
            prefetch_path: PathBuf::new(),
            image_expires_after: String::new(),
            commit_sha: String::new(),
            build_args: Vec::new(),
            build_args_file: String::new(),
            tls_verify: true,
        }
    }
}

impl BuildConfig {
    /// Hermetic flags only apply when there are declared dependencies.
    pub fn is_hermetic(&self) -> bool {
        self.hermetic && !self.prefetch_input.is_empty()
    }
}

/// `buildah build` arguments, in the fixed order the build tool expects.
///
/// `now` is the instant the expiration label is computed from.
pub fn build_command(config: &BuildConfig, now: DateTime<Utc>) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--file".to_string(),
        path_arg(&config.dockerfile),
        "--tag".to_string(),
        config.image_url.clone(),
    ];

    if !config.tls_verify {
        args.push(TLS_VERIFY_DISABLED.to_string());
    }

    for arg in config.build_args.iter().filter(|a| !a.is_empty()) {
        args.push("--build-arg".to_string());
        args.push(arg.clone());
    }

    if !config.build_args_file.is_empty() {
        args.push("--build-arg-file".to_string());
        args.push(config.build_args_file.clone());
    }

    if config.is_hermetic() {
        args.push("--network=none".to_string());
        args.push("--volume".to_string());
        args.push(format!(
            "{}:{}:Z",
            config.prefetch_path.display(),
            PREFETCH_MOUNT
        ));
        args.push("--build-arg".to_string());
        args.push(format!("CACHI2_ENV_FILE={}/cachi2.env", PREFETCH_MOUNT));
    }

    if !config.commit_sha.is_empty() {
        args.push("--label".to_string());
        args.push(format!("{}={}", COMMIT_LABEL, config.commit_sha));
    }

    if let Some(expires_at) = expiration_timestamp(&config.image_expires_after, now) {
        args.push("--label".to_string());
        args.push(format!("{}={}", EXPIRES_LABEL, expires_at));
    }

    // The context must stay last: `buildah build [flags] context`
    args.push(path_arg(&config.context));
    args
}

/// `now + duration` as an RFC 3339 timestamp with whole seconds, or `None`
/// when the duration string is empty or does not parse to a positive span.
pub fn expiration_timestamp(expires_after: &str, now: DateTime<Utc>) -> Option<String> {
    let duration = parse_duration(expires_after);
    if duration.is_zero() {
        return None;
    }
    let delta = chrono::Duration::from_std(duration).ok()?;
    let expires_at = now.checked_add_signed(delta)?;
    Some(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Wraps a build-tool invocation for rootless execution.
///
/// The inner command is passed to `sh -c` as a single string, with every
/// argument quoted on its own so build-arg values containing spaces or shell
/// metacharacters reach `buildah` unchanged.
pub fn unshare_command(build_args: &[String], context: &std::path::Path) -> Vec<String> {
    let inner = std::iter::once(BUILD_TOOL)
        .chain(build_args.iter().map(String::as_str));
    let script = shell_words::join(inner);

    vec![
        "-Uf".to_string(),
        "--keep-caps".to_string(),
        "-r".to_string(),
        "--map-users".to_string(),
        ID_MAP.to_string(),
        "--map-groups".to_string(),
        ID_MAP.to_string(),
        "-w".to_string(),
        path_arg(context),
        "--mount".to_string(),
        "--".to_string(),
        "sh".to_string(),
        "-c".to_string(),
        script,
    ]
}

/// `buildah push` from local storage to the registry.
pub fn push_command(image_url: &str, tls_verify: bool) -> Vec<String> {
    let mut args = vec!["push".to_string()];
    push_tls(&mut args, tls_verify);
    args.push(image_url.to_string());
    args.push(docker_ref(image_url));
    args
}

/// `skopeo inspect` returning the JSON document with the `Digest` field.
pub fn inspect_command(image_url: &str, tls_verify: bool) -> Vec<String> {
    let mut args = vec!["inspect".to_string()];
    push_tls(&mut args, tls_verify);
    args.push(docker_ref(image_url));
    args
}

/// `skopeo inspect --raw` used only for its exit status.
pub fn exists_command(image_url: &str, tls_verify: bool) -> Vec<String> {
    let mut args = vec![
        "inspect".to_string(),
        "--raw".to_string(),
        format!("--retry-times={}", EXISTS_RETRY_TIMES),
    ];
    push_tls(&mut args, tls_verify);
    args.push(docker_ref(image_url));
    args
}

/// Deterministic local name of the manifest list assembled for `image_url`.
pub fn manifest_handle(image_url: &str) -> String {
    format!("{}-index", image_url)
}

pub fn manifest_create_command(handle: &str) -> Vec<String> {
    vec![
        "manifest".to_string(),
        "create".to_string(),
        handle.to_string(),
    ]
}

pub fn manifest_add_command(handle: &str, member: &str, tls_verify: bool) -> Vec<String> {
    let mut args = vec!["manifest".to_string(), "add".to_string()];
    push_tls(&mut args, tls_verify);
    args.push(handle.to_string());
    args.push(docker_ref(member));
    args
}

pub fn manifest_push_command(handle: &str, image_url: &str, tls_verify: bool) -> Vec<String> {
    let mut args = vec![
        "manifest".to_string(),
        "push".to_string(),
        "--all".to_string(),
    ];
    push_tls(&mut args, tls_verify);
    args.push(handle.to_string());
    args.push(docker_ref(image_url));
    args
}

pub fn manifest_remove_command(handle: &str) -> Vec<String> {
    vec!["manifest".to_string(), "rm".to_string(), handle.to_string()]
}

fn push_tls(args: &mut Vec<String>, tls_verify: bool) {
    if !tls_verify {
        args.push(TLS_VERIFY_DISABLED.to_string());
    }
}

fn docker_ref(image_url: &str) -> String {
    format!("{}{}", DOCKER_TRANSPORT, image_url)
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::path::Path;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn basic_config() -> BuildConfig {
        BuildConfig {
            image_url: "quay.io/test/image:tag".to_string(),
            dockerfile: PathBuf::from("./Dockerfile"),
            context: PathBuf::from("."),
            ..Default::default()
        }
    }

    fn label_value<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
        args.windows(2)
            .find(|w| w[0] == "--label" && w[1].starts_with(prefix))
            .map(|w| w[1].as_str())
    }

    #[test]
    fn test_basic_build_command() {
        let result = build_command(&basic_config(), now());
        assert_eq!(
            result,
            vec![
                "build",
                "--file",
                "./Dockerfile",
                "--tag",
                "quay.io/test/image:tag",
                "."
            ]
        );
    }

    #[test]
    fn test_build_args_preserve_order_and_skip_empty() {
        let config = BuildConfig {
            build_args: vec![
                "GO_VERSION=1.21".to_string(),
                String::new(),
                "DEBUG=true".to_string(),
            ],
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert_eq!(
            result,
            vec![
                "build",
                "--file",
                "./Dockerfile",
                "--tag",
                "quay.io/test/image:tag",
                "--build-arg",
                "GO_VERSION=1.21",
                "--build-arg",
                "DEBUG=true",
                "."
            ]
        );
    }

    #[test]
    fn test_tls_flag_precedes_build_args() {
        let config = BuildConfig {
            tls_verify: false,
            build_args: vec!["KEY=value".to_string()],
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert_eq!(result[5], "--tls-verify=false");
        assert_eq!(result[6], "--build-arg");
        assert_eq!(result[7], "KEY=value");
    }

    #[test]
    fn test_build_args_file() {
        let config = BuildConfig {
            build_args: vec!["A=1".to_string()],
            build_args_file: "argfile.conf".to_string(),
            ..basic_config()
        };
        let result = build_command(&config, now());
        let pos = result.iter().position(|a| a == "--build-arg-file").unwrap();
        assert_eq!(result[pos + 1], "argfile.conf");
        assert!(pos > result.iter().position(|a| a == "A=1").unwrap());
    }

    #[test]
    fn test_hermetic_flags() {
        let config = BuildConfig {
            hermetic: true,
            prefetch_input: "gomod".to_string(),
            prefetch_path: PathBuf::from("/workspace/cachi2"),
            commit_sha: "abc123def456".to_string(),
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert_eq!(
            result,
            vec![
                "build",
                "--file",
                "./Dockerfile",
                "--tag",
                "quay.io/test/image:tag",
                "--network=none",
                "--volume",
                "/workspace/cachi2:/cachi2:Z",
                "--build-arg",
                "CACHI2_ENV_FILE=/cachi2/cachi2.env",
                "--label",
                "io.konflux.commit=abc123def456",
                "."
            ]
        );
    }

    #[test]
    fn test_hermetic_without_prefetch_input_is_noop() {
        let config = BuildConfig {
            hermetic: true,
            prefetch_path: PathBuf::from("/workspace/cachi2"),
            ..basic_config()
        };
        assert_eq!(build_command(&config, now()), build_command(&basic_config(), now()));
    }

    #[test]
    fn test_prefetch_without_hermetic_adds_no_flags() {
        let config = BuildConfig {
            prefetch_input: "gomod".to_string(),
            prefetch_path: PathBuf::from("/workspace/cachi2"),
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert!(!result.contains(&"--network=none".to_string()));
    }

    #[test]
    fn test_commit_label() {
        let config = BuildConfig {
            commit_sha: "abc123def456".to_string(),
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert_eq!(
            label_value(&result, "io.konflux.commit="),
            Some("io.konflux.commit=abc123def456")
        );
    }

    #[test]
    fn test_expiration_label_uses_supplied_clock() {
        let config = BuildConfig {
            image_expires_after: "24h".to_string(),
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert_eq!(
            label_value(&result, "quay.expires-after="),
            Some("quay.expires-after=2026-03-02T12:00:00Z")
        );
        assert_eq!(result.last().unwrap(), ".");
    }

    #[test]
    fn test_unparseable_expiration_adds_no_label() {
        let config = BuildConfig {
            image_expires_after: "bogus".to_string(),
            ..basic_config()
        };
        let result = build_command(&config, now());
        assert!(label_value(&result, "quay.expires-after=").is_none());
    }

    #[test]
    fn test_full_order() {
        let config = BuildConfig {
            tls_verify: false,
            build_args: vec!["A=1".to_string()],
            build_args_file: "args.env".to_string(),
            hermetic: true,
            prefetch_input: "pip".to_string(),
            prefetch_path: PathBuf::from("/w/cachi2"),
            commit_sha: "deadbeef".to_string(),
            image_expires_after: "1w".to_string(),
            context: PathBuf::from("/w/source"),
            ..basic_config()
        };
        let result = build_command(&config, now());
        let pos = |needle: &str| result.iter().position(|a| a == needle).unwrap();

        assert!(pos("--tag") < pos("--tls-verify=false"));
        assert!(pos("--tls-verify=false") < pos("A=1"));
        assert!(pos("A=1") < pos("--build-arg-file"));
        assert!(pos("--build-arg-file") < pos("--network=none"));
        assert!(pos("--network=none") < pos("io.konflux.commit=deadbeef"));
        assert!(pos("io.konflux.commit=deadbeef") < pos("quay.expires-after=2026-03-08T12:00:00Z"));
        assert_eq!(result.last().unwrap(), "/w/source");
    }

    #[test]
    fn test_unshare_command_shape() {
        let inner = vec![
            "build".to_string(),
            "--tag".to_string(),
            "test".to_string(),
            ".".to_string(),
        ];
        let result = unshare_command(&inner, Path::new("/workspace/source"));
        assert_eq!(
            &result[..13],
            &[
                "-Uf",
                "--keep-caps",
                "-r",
                "--map-users",
                "1,1,65536",
                "--map-groups",
                "1,1,65536",
                "-w",
                "/workspace/source",
                "--mount",
                "--",
                "sh",
                "-c",
            ]
        );
        assert_eq!(result[13], "buildah build --tag test .");
    }

    #[test]
    fn test_unshare_quotes_each_argument() {
        let inner = vec![
            "build".to_string(),
            "--build-arg".to_string(),
            "KEY=value with spaces".to_string(),
            "--build-arg".to_string(),
            "CMD=$(rm -rf /); echo 'hi'".to_string(),
            ".".to_string(),
        ];
        let result = unshare_command(&inner, Path::new("/workspace/source"));
        let script = result.last().unwrap();

        assert!(script.starts_with("buildah build"));
        assert!(script.contains("'KEY=value with spaces'"));

        let reparsed = shell_words::split(script).unwrap();
        assert_eq!(reparsed[0], "buildah");
        assert_eq!(&reparsed[1..], inner.as_slice());
    }

    #[test]
    fn test_push_command() {
        assert_eq!(
            push_command("quay.io/test/image:tag", true),
            vec!["push", "quay.io/test/image:tag", "docker://quay.io/test/image:tag"]
        );
        assert_eq!(
            push_command("quay.io/test/image:tag", false),
            vec![
                "push",
                "--tls-verify=false",
                "quay.io/test/image:tag",
                "docker://quay.io/test/image:tag"
            ]
        );
    }

    #[test]
    fn test_inspect_command() {
        assert_eq!(
            inspect_command("quay.io/test/image:tag", true),
            vec!["inspect", "docker://quay.io/test/image:tag"]
        );
        assert_eq!(
            inspect_command("quay.io/test/image:tag", false),
            vec![
                "inspect",
                "--tls-verify=false",
                "docker://quay.io/test/image:tag"
            ]
        );
    }

    #[test]
    fn test_exists_command() {
        assert_eq!(
            exists_command("quay.io/test/image:tag", true),
            vec![
                "inspect",
                "--raw",
                "--retry-times=3",
                "docker://quay.io/test/image:tag"
            ]
        );
        assert_eq!(
            exists_command("quay.io/test/image:tag", false),
            vec![
                "inspect",
                "--raw",
                "--retry-times=3",
                "--tls-verify=false",
                "docker://quay.io/test/image:tag"
            ]
        );
    }

    #[test]
    fn test_manifest_commands() {
        let handle = manifest_handle("quay.io/test/app:v1");
        assert_eq!(handle, "quay.io/test/app:v1-index");
        assert_eq!(
            manifest_create_command(&handle),
            vec!["manifest", "create", "quay.io/test/app:v1-index"]
        );
        assert_eq!(
            manifest_add_command(&handle, "quay.io/test/app@sha256:aa", false),
            vec![
                "manifest",
                "add",
                "--tls-verify=false",
                "quay.io/test/app:v1-index",
                "docker://quay.io/test/app@sha256:aa"
            ]
        );
        assert_eq!(
            manifest_push_command(&handle, "quay.io/test/app:v1", true),
            vec![
                "manifest",
                "push",
                "--all",
                "quay.io/test/app:v1-index",
                "docker://quay.io/test/app:v1"
            ]
        );
        assert_eq!(
            manifest_remove_command(&handle),
            vec!["manifest", "rm", "quay.io/test/app:v1-index"]
        );
    }

    proptest! {
        #[test]
        fn prop_build_command_is_deterministic(
            image in "[a-z]{1,8}\\.io/[a-z]{1,8}:[a-z0-9]{1,6}",
            build_args in proptest::collection::vec("[A-Z]{1,5}=[ -~]{0,12}", 0..5),
            tls_verify in any::<bool>(),
            hermetic in any::<bool>(),
            expires in prop_oneof![Just(""), Just("2d"), Just("bogus"), Just("30m")],
        ) {
            let config = BuildConfig {
                image_url: image,
                build_args,
                tls_verify,
                hermetic,
                prefetch_input: "gomod".to_string(),
                prefetch_path: PathBuf::from("/w/cachi2"),
                image_expires_after: expires.to_string(),
                ..Default::default()
            };
            let first = build_command(&config, now());
            let second = build_command(&config.clone(), now());
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.last().unwrap().as_str(), ".");

            let wrapped = unshare_command(&first, Path::new("/w/source"));
            let reparsed = shell_words::split(wrapped.last().unwrap()).unwrap();
            prop_assert_eq!(&reparsed[1..], first.as_slice());
        }
    }
}
