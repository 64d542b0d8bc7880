//! Tests for command-line construction through the public API.

use claude_session::{Error, LaunchOptions, PermissionMode};

#[test]
fn required_flags_come_first_and_prompt_last() {
    let args = LaunchOptions::new()
        .permission_mode(PermissionMode::Plan)
        .allowed_tools(&["Read", "Grep"])
        .build_args("review the diff", None)
        .unwrap();

    assert_eq!(&args[..4], ["--print", "--output-format", "stream-json", "--verbose"]);
    assert_eq!(args.last().map(String::as_str), Some("review the diff"));
    assert!(args.windows(2).any(|w| w == ["--permission-mode", "plan"]));
}

#[test]
fn output_format_override_is_rejected() {
    let err = LaunchOptions::new()
        .additional_arg("--output-format")
        .additional_arg("text")
        .build_args("hi", None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn permission_mode_parses_cli_values() {
    assert_eq!("acceptEdits".parse::<PermissionMode>().unwrap(), PermissionMode::AcceptEdits);
    assert!("yolo".parse::<PermissionMode>().is_err());
}
