use assert_cmd::Command;
use tempfile::tempdir;

fn ytscrape() -> Command {
    let mut cmd = Command::cargo_bin("ytscrape").unwrap();
    cmd.env_remove("YTSCRAPE_YT_DLP").env_remove("YTSCRAPE_LANG");
    cmd
}

#[test]
fn unknown_command_is_reported_on_stdout() {
    ytscrape()
        .arg("bogus")
        .assert()
        .success()
        .stdout("Unknown command: bogus\n");
}

#[test]
fn unknown_command_ignores_invalid_proxy() {
    ytscrape()
        .args(["--proxy", "http://[bad", "bogus"])
        .assert()
        .success()
        .stdout("Unknown command: bogus\n");
}

#[test]
fn invalid_proxy_fails_listing() {
    ytscrape()
        .args(["--proxy", "http://[bad", "channel", "UC123"])
        .assert()
        .failure()
        .code(1)
        .stdout("");
}

#[test]
fn no_arguments_prints_usage_and_fails() {
    ytscrape().assert().failure();
}

#[test]
fn missing_channel_id_fails() {
    ytscrape().arg("channel").assert().failure().code(2);
}

#[test]
fn non_numeric_limit_fails() {
    ytscrape()
        .args(["search", "rust", "lots"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_downloader_is_fatal() {
    let work = tempdir().unwrap();

    ytscrape()
        .current_dir(work.path())
        .args(["--yt-dlp", "/nonexistent/yt-dlp-binary"])
        .args(["transcript", "https://youtube.com/watch?v=abc"])
        .assert()
        .failure()
        .code(1)
        .stdout("");
}

#[cfg(unix)]
mod downloader {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    const WRITES_CAPTIONS: &str = r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
  esac
  shift
done
printf 'WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:02.000\nhello <c>world</c>\n\n00:00:02.000 --> 00:00:04.000\nhello world\nsalt &amp; pepper\n' > "$out.en.vtt""#;

    fn fake_downloader(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("transcript_temp"))
            .collect()
    }

    #[test]
    fn transcript_printed_to_stdout() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_downloader(bin.path(), WRITES_CAPTIONS);

        ytscrape()
            .current_dir(work.path())
            .env("YTSCRAPE_YT_DLP", &program)
            .args(["transcript", "https://youtube.com/watch?v=abc"])
            .assert()
            .success()
            .stdout("hello world\nsalt & pepper\n");

        assert!(leftovers(work.path()).is_empty());
    }

    #[test]
    fn transcript_saved_to_file() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_downloader(bin.path(), WRITES_CAPTIONS);

        ytscrape()
            .current_dir(work.path())
            .env("YTSCRAPE_YT_DLP", &program)
            .args(["transcript", "https://youtube.com/watch?v=abc", "out.txt"])
            .assert()
            .success()
            .stdout("Transcript saved to: out.txt\n");

        let saved = std::fs::read_to_string(work.path().join("out.txt")).unwrap();
        assert_eq!(saved, "hello world\nsalt & pepper");
        assert!(leftovers(work.path()).is_empty());
    }

    #[test]
    fn no_captions_is_not_an_error() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_downloader(bin.path(), "exit 0");

        ytscrape()
            .current_dir(work.path())
            .env("YTSCRAPE_YT_DLP", &program)
            .args(["transcript", "https://youtube.com/watch?v=abc", "out.txt"])
            .assert()
            .success()
            .stdout("No transcript available for this video\n");

        assert!(!work.path().join("out.txt").exists());
        assert!(leftovers(work.path()).is_empty());
    }

    #[test]
    fn transcript_ignores_invalid_proxy() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_downloader(bin.path(), WRITES_CAPTIONS);

        ytscrape()
            .current_dir(work.path())
            .env("YTSCRAPE_YT_DLP", &program)
            .args(["--proxy", "http://[bad"])
            .args(["transcript", "https://youtube.com/watch?v=abc"])
            .assert()
            .success()
            .stdout("hello world\nsalt & pepper\n");
    }

    #[test]
    fn downloader_failure_reports_stderr() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_downloader(bin.path(), "echo 'ERROR: Private video' >&2\nexit 1");

        ytscrape()
            .current_dir(work.path())
            .args(["--yt-dlp", program.as_str()])
            .args(["transcript", "https://youtube.com/watch?v=private"])
            .assert()
            .success()
            .stdout("Error: ERROR: Private video\n");

        assert!(leftovers(work.path()).is_empty());
    }
}
