//! Incremental build behaviour through the command line.

#![cfg(unix)]

use predicates::prelude::*;

use super::common::TestEnv;

const COPY_BUILDFILE: &str = r#"
[targets.default]
prereqs = ["out/copy.txt"]

[targets."out/copy.txt"]
description = "Copy the input"
prereqs = ["input.txt"]
shell = 'echo run >> runs.log && cp input.txt "$TMAKE_TARGET"'
"#;

fn copy_env() -> TestEnv {
  let env = TestEnv::with_buildfile(COPY_BUILDFILE);
  env.write_file("input.txt", "hello");
  env.set_mtime("input.txt", 2_000_000);
  env
}

#[test]
fn builds_default_target_and_creates_parent_dirs() {
  let env = copy_env();

  env.tmake().assert().success();

  assert_eq!(env.read_file("out/copy.txt"), "hello");
  assert_eq!(env.runs("runs.log"), 1);
}

#[test]
fn second_run_is_a_no_op() {
  let env = copy_env();

  env.tmake().assert().success();
  env.tmake().assert().success();

  assert_eq!(env.runs("runs.log"), 1);
}

#[test]
fn newer_input_triggers_rebuild() {
  let env = copy_env();
  env.tmake().assert().success();
  env.set_mtime("out/copy.txt", 3_000_000);

  env.write_file("input.txt", "changed");
  env.set_mtime("input.txt", 4_000_000);
  env.tmake().assert().success();

  assert_eq!(env.read_file("out/copy.txt"), "changed");
  assert_eq!(env.runs("runs.log"), 2);
}

#[test]
fn editing_buildfile_invalidates_targets() {
  let env = copy_env();
  env.tmake().assert().success();
  env.set_mtime("out/copy.txt", 3_000_000);

  env.set_mtime("Buildfile.toml", 4_000_000);
  env.tmake().assert().success();

  assert_eq!(env.runs("runs.log"), 2);
}

#[test]
fn backslash_target_names_are_normalized() {
  let env = copy_env();

  env.tmake().arg("out\\copy.txt").assert().success();

  assert_eq!(env.read_file("out/copy.txt"), "hello");
}

#[test]
fn failed_command_removes_artifact_and_reports_trace() {
  let env = TestEnv::with_buildfile(
    r#"
[targets.default]
prereqs = ["broken.txt"]

[targets."broken.txt"]
shell = 'echo partial > broken.txt && exit 3'
"#,
  );

  env
    .tmake()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("process exited with code 3"))
    .stderr(predicate::str::contains("argv[0] > default > broken.txt"));

  assert!(!env.path("broken.txt").exists());
}

#[test]
fn keep_on_failure_leaves_artifact() {
  let env = TestEnv::with_buildfile(
    r#"
[targets."report.txt"]
shell = 'echo partial > report.txt && exit 1'
keep_on_failure = true
"#,
  );

  env.tmake().arg("report.txt").assert().failure();

  assert_eq!(env.read_file("report.txt"), "partial\n");
}

#[test]
fn directory_target_is_touched() {
  let env = TestEnv::with_buildfile(
    r#"
[targets.site]
is_directory = true
shell = 'mkdir -p site && echo page > site/index.html && touch -t 197001020000 site/index.html site'
"#,
  );

  env.tmake().arg("site").assert().success();
  env.tmake().arg("site").assert().success();

  let mtime = filetime::FileTime::from_last_modification_time(&std::fs::metadata(env.path("site")).unwrap());
  assert!(mtime.unix_seconds() > 1_000_000);
}

#[test]
fn one_failure_fails_whole_run_but_siblings_finish() {
  let env = TestEnv::with_buildfile(
    r#"
[targets.good]
shell = 'echo ok > good'

[targets.bad]
cmd = ["false"]
"#,
  );

  env.tmake().args(["good", "bad"]).assert().failure();

  assert!(env.path("good").exists());
}

#[test]
fn command_with_cwd_writes_target_relative_to_invoker() {
  let env = TestEnv::with_buildfile(
    r#"
[targets."out/copy.txt"]
prereqs = ["input.txt"]
cwd = "work"
shell = 'pwd > ran_in.txt && cp ../input.txt "$TMAKE_TARGET"'
"#,
  );
  env.write_file("input.txt", "hello");
  env.write_file("work/.keep", "");

  env.tmake().arg("out/copy.txt").assert().success();

  assert_eq!(env.read_file("out/copy.txt"), "hello");
  assert!(!env.path("work/out").exists());
  assert!(env.path("work/ran_in.txt").exists());
}
