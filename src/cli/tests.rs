use super::*;

fn try_parse(args: &[&str]) -> Result<Args, clap::Error> {
    let mut argv = vec!["wayland-automation-proxy"];
    argv.extend_from_slice(args);
    Args::try_parse_from(argv)
}

#[test]
fn defaults_to_capture_mode() {
    let args = try_parse(&["weston-terminal"]).unwrap();
    assert!(!args.capture);
    assert!(!args.replay);
    assert_eq!(args.command, vec!["weston-terminal"]);
}

#[test]
fn explicit_capture_flag_is_accepted() {
    let args = try_parse(&["-c", "weston-terminal"]).unwrap();
    assert!(args.capture);
}

#[test]
fn replay_flag_selects_replay_mode() {
    let args = try_parse(&["-r", "weston-terminal"]).unwrap();
    assert!(args.replay);
}

#[test]
fn trailing_args_are_passed_through_to_the_command() {
    let args = try_parse(&["-r", "--", "weston-terminal", "--fullscreen"]).unwrap();
    assert_eq!(args.command, vec!["weston-terminal", "--fullscreen"]);
}

#[test]
fn capture_and_replay_together_is_rejected() {
    assert!(try_parse(&["-c", "-r", "weston-terminal"]).is_err());
}

#[test]
fn missing_command_is_rejected() {
    assert!(try_parse(&[]).is_err());
}

#[test]
fn help_flag_reports_exit_code_zero() {
    match Args::try_parse_from(["wayland-automation-proxy", "-h"]) {
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => {}
        other => panic!("expected a DisplayHelp error, got {other:?}"),
    }
}

#[test]
fn unknown_flag_is_rejected() {
    assert!(try_parse(&["--not-a-real-flag"]).is_err());
}
