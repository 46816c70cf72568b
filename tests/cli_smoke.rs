use std::{
    path::Path,
    process::{Command, Output},
};

use serde_json::Value;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn vidseek(data_dir: &Path, args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_vidseek"))
        .args(args)
        .env("VIDSEEK_DATA_DIR", data_dir)
        .env("VIDSEEK_LOG", "warn")
        .output()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn setup_videos(folder: &Path) -> std::io::Result<()> {
    std::fs::write(folder.join("a.mp4"), b"")?;
    std::fs::write(
        folder.join("a.json"),
        r#"{"text": "...", "segments": [
            {"id": 0, "text": " Hello 世界 ", "start": 0.0, "end": 2.5},
            {"id": 1, "text": " Goodbye now", "start": 3.0, "end": 4.25}
        ], "language": "en"}"#,
    )?;
    std::fs::write(folder.join("b.mov"), b"")?;
    std::fs::write(
        folder.join("b.json"),
        r#"{"segments": [{"text": "hello again", "start": 1.5, "end": 3.0}]}"#,
    )?;
    // No sidecar: this one fails without stopping the run.
    std::fs::write(folder.join("c.avi"), b"")?;
    std::fs::write(folder.join("notes.txt"), b"not a video")?;
    Ok(())
}

fn build_fixture(data_dir: &Path, videos: &Path) -> TestResult {
    setup_videos(videos)?;
    let set = vidseek(data_dir, &["config", "set", "transcriber", "sidecar"])?;
    assert!(set.status.success(), "config set failed: {}", stderr(&set));

    let folder = videos.to_str().ok_or("non UTF-8 temp path")?;
    let build = vidseek(data_dir, &["build", "--folder", folder])?;
    assert!(build.status.success(), "build failed: {}", stderr(&build));
    let out = stdout(&build);
    assert!(out.contains("2/3 videos indexed"), "unexpected summary: {out}");
    assert!(out.contains("c.avi"), "failure not reported: {out}");
    Ok(())
}

#[test]
fn build_then_search_with_sidecar_transcripts() -> TestResult {
    let data_dir = tempfile::tempdir()?;
    let videos = tempfile::tempdir()?;
    build_fixture(data_dir.path(), videos.path())?;

    let snapshot: Value = serde_json::from_slice(&std::fs::read(
        videos.path().join("video_index.json"),
    )?)?;
    assert!(snapshot["index"]["hello"].is_array());
    assert!(
        snapshot["words"]
            .as_array()
            .is_some_and(|w| w.iter().any(|v| v == "世界"))
    );

    // The build made the folder active, so no --folder is needed.
    let search = vidseek(data_dir.path(), &["search", "HELLO", "--json"])?;
    assert!(search.status.success(), "search failed: {}", stderr(&search));
    let parsed: Value = serde_json::from_str(&stdout(&search))?;
    let results = parsed["results"].as_array().ok_or("results array")?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["video"], "a.mp4");
    assert_eq!(results[0]["text"], "Hello 世界");
    assert_eq!(results[1]["video"], "b.mov");
    assert_eq!(results[1]["start"], 1.5);

    let chinese = vidseek(data_dir.path(), &["search", "世界"])?;
    assert!(chinese.status.success());
    let out = stdout(&chinese);
    assert!(out.contains("a.mp4  Hello 世界 (0.0s - 2.5s)"), "got: {out}");

    let words = vidseek(data_dir.path(), &["words", "--json"])?;
    let words: Vec<String> = serde_json::from_str(&stdout(&words))?;
    assert!(words.contains(&"goodbye".to_string()));
    assert!(words.contains(&"again".to_string()));
    assert!(words.windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

#[test]
fn rebuild_does_not_duplicate_results() -> TestResult {
    let data_dir = tempfile::tempdir()?;
    let videos = tempfile::tempdir()?;
    build_fixture(data_dir.path(), videos.path())?;

    let rebuild = vidseek(data_dir.path(), &["rebuild"])?;
    assert!(rebuild.status.success(), "rebuild failed: {}", stderr(&rebuild));

    let search = vidseek(data_dir.path(), &["search", "goodbye", "--json"])?;
    let parsed: Value = serde_json::from_str(&stdout(&search))?;
    assert_eq!(parsed["result_count"], 1);
    Ok(())
}

#[test]
fn status_reports_active_folder() -> TestResult {
    let data_dir = tempfile::tempdir()?;
    let videos = tempfile::tempdir()?;
    build_fixture(data_dir.path(), videos.path())?;

    let status = vidseek(data_dir.path(), &["status", "--json"])?;
    assert!(status.status.success());
    let parsed: Value = serde_json::from_str(&stdout(&status))?;
    assert_eq!(parsed["indexed"], true);
    assert_eq!(parsed["transcriber"], "sidecar");
    assert_eq!(parsed["data_dir_source"], "VIDSEEK_DATA_DIR");
    assert!(parsed["words"].as_u64().is_some_and(|n| n >= 4));
    assert_eq!(parsed["known_folders"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn search_without_folder_fails() -> TestResult {
    let data_dir = tempfile::tempdir()?;
    let search = vidseek(data_dir.path(), &["search", "hello"])?;
    assert!(!search.status.success());
    assert!(stderr(&search).contains("NoFolder"), "got: {}", stderr(&search));
    Ok(())
}

#[test]
fn corrupt_index_is_reported() -> TestResult {
    let data_dir = tempfile::tempdir()?;
    let videos = tempfile::tempdir()?;
    std::fs::write(videos.path().join("video_index.json"), b"{not json")?;

    let folder = videos.path().to_str().ok_or("non UTF-8 temp path")?;
    let search =
        vidseek(data_dir.path(), &["search", "hello", "--folder", folder])?;
    assert!(!search.status.success());
    let err = stderr(&search);
    assert!(err.contains("CorruptState"), "got: {err}");
    assert!(err.contains("video_index.json"), "got: {err}");
    Ok(())
}

#[test]
fn unknown_setting_is_rejected() -> TestResult {
    let data_dir = tempfile::tempdir()?;
    let set = vidseek(data_dir.path(), &["config", "set", "colour", "blue"])?;
    assert!(!set.status.success());

    let bad = vidseek(
        data_dir.path(),
        &["config", "set", "extension_match", "sometimes"],
    )?;
    assert!(!bad.status.success());

    let get = vidseek(data_dir.path(), &["config", "get", "player_command"])?;
    assert!(get.status.success());
    assert_eq!(stdout(&get).trim(), "mpv");
    Ok(())
}
