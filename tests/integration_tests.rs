//! # Integration Tests for mediaspinner
//!
//! End-to-end tests from a user's point of view: a media tree on disk, a policy
//! file, and selections made through the library and through the CLI binary.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Test helper creating a media tree with a policy file next to it.
///
/// ```text
/// <tmp>/rotation.json
/// <tmp>/media/music/{a,b,c}.mp3
/// <tmp>/media/ads/x.mp3
/// <tmp>/media/jingles/            (empty)
/// ```
fn create_media_tree(policy: &str) -> Result<(TempDir, PathBuf, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let base = temp_dir.path().join("media");

    fs::create_dir_all(base.join("music"))?;
    fs::create_dir_all(base.join("ads"))?;
    fs::create_dir_all(base.join("jingles"))?;
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        fs::write(base.join("music").join(name), name)?;
    }
    fs::write(base.join("ads/x.mp3"), "x")?;

    let config = temp_dir.path().join("rotation.json");
    fs::write(&config, policy)?;

    Ok((temp_dir, base, config))
}

const RADIO_POLICY: &str = r#"{
    "same_item_backoff": 1,
    "collections": {
        "music": {"weight": 10},
        "ads": {"weight": 1, "backoff": 2}
    }
}"#;

fn mediaspinner(base: &Path, config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mediaspinner"))
        .arg("--base-dir")
        .arg(base)
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to run mediaspinner")
}

#[cfg(test)]
mod library_tests {
    use super::*;
    use mediaspinner::collections::CollectionIndex;
    use mediaspinner::config::{ConfigError, PolicyConfig};
    use mediaspinner::selector::{HistoryCapacity, MediaSelector, DEFAULT_FIXED_HISTORY};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_directory_to_selection() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(RADIO_POLICY)?;

        let index = CollectionIndex::from_dir(&base)?;
        let policy = PolicyConfig::load(&config)?;
        let mut selector = MediaSelector::with_rng(
            index,
            policy,
            HistoryCapacity::Dynamic,
            StdRng::seed_from_u64(12),
        )?;

        let picks: Vec<_> = (0..200).map(|_| selector.select_next_detailed()).collect();
        for (i, pick) in picks.iter().enumerate() {
            assert!(base.join(&pick.item.path).is_file(), "{} is not a file", pick.item.path);
            assert_ne!(pick.item.collection, "jingles");
            if i > 0 && !pick.fallback {
                assert_ne!(pick.item.path, picks[i - 1].item.path);
            }
        }
        Ok(())
    }

    #[test]
    fn test_empty_configured_collection_is_fatal() -> Result<()> {
        let (_temp_dir, base, _config) = create_media_tree(RADIO_POLICY)?;
        let index = CollectionIndex::from_dir(&base)?;
        let policy = PolicyConfig::from_json(r#"{"collections": {"music": {}, "jingles": {}}}"#)?;

        let error = MediaSelector::new(index, policy, HistoryCapacity::Dynamic).unwrap_err();
        assert_eq!(error, ConfigError::EmptyCollection("jingles".to_string()));
        Ok(())
    }

    #[test]
    fn test_fixed_and_dynamic_history_share_rules() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(RADIO_POLICY)?;

        for capacity in [HistoryCapacity::Dynamic, HistoryCapacity::Fixed(DEFAULT_FIXED_HISTORY)] {
            let index = CollectionIndex::from_dir(&base)?;
            let policy = PolicyConfig::load(&config)?;
            let mut selector =
                MediaSelector::with_rng(index, policy, capacity, StdRng::seed_from_u64(4))?;

            let picks: Vec<_> = (0..300).map(|_| selector.select_next_detailed()).collect();
            for (i, pick) in picks.iter().enumerate() {
                if pick.item.collection == "ads" && !pick.fallback {
                    let window = &picks[i.saturating_sub(2)..i];
                    assert!(window.iter().all(|p| p.item.collection != "ads"));
                }
            }
            assert!(selector.history().len() <= selector.history_capacity());
        }
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = Command::new(env!("CARGO_BIN_EXE_mediaspinner"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("mediaspinner"));
        assert!(stdout.contains("play"));
        assert!(stdout.contains("serve"));
        assert!(stdout.contains("pick"));
    }

    #[test]
    fn test_pick_prints_requested_count() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(RADIO_POLICY)?;
        let output = mediaspinner(&base, &config, &["pick", "-n", "7"]);

        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 7);
        for line in lines {
            assert!(line.starts_with("music/") || line == "ads/x.mp3", "unexpected pick {line}");
        }
        Ok(())
    }

    #[test]
    fn test_pick_verbose_columns() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(RADIO_POLICY)?;
        let output = mediaspinner(&base, &config, &["pick", "-n", "3", "--verbose"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            let columns: Vec<&str> = line.split('\t').collect();
            assert!(columns.len() >= 3);
            assert!(columns[2].starts_with("attempts="));
        }
        Ok(())
    }

    #[test]
    fn test_empty_policy_fails_before_selecting() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(r#"{"collections": {}}"#)?;
        let output = mediaspinner(&base, &config, &["pick"]);

        assert!(!output.status.success());
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("no collections"), "stderr: {stderr}");
        Ok(())
    }

    #[test]
    fn test_unknown_collection_fails() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(r#"{"collections": {"podcasts": {}}}"#)?;
        let output = mediaspinner(&base, &config, &["pick"]);

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("podcasts"));
        Ok(())
    }

    #[test]
    fn test_missing_config_fails() -> Result<()> {
        let (temp_dir, base, _config) = create_media_tree(RADIO_POLICY)?;
        let output = mediaspinner(&base, &temp_dir.path().join("nope.json"), &["pick"]);
        assert!(!output.status.success());
        Ok(())
    }

    #[test]
    fn test_list_shows_policy() -> Result<()> {
        let (_temp_dir, base, config) = create_media_tree(RADIO_POLICY)?;
        let output = mediaspinner(&base, &config, &["list"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("same_item_backoff: 1"));
        assert!(stdout.contains("music\t3 files\tweight=10\tbackoff=0"));
        assert!(stdout.contains("ads\t1 files\tweight=1\tbackoff=2"));
        assert!(stdout.contains("jingles\t0 files\t(not in policy)"));
        Ok(())
    }

    #[test]
    fn test_completion_generation() {
        let output = Command::new(env!("CARGO_BIN_EXE_mediaspinner"))
            .args(["completion", "bash"])
            .output()
            .expect("Failed to run completion command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_mediaspinner"));
        assert!(stdout.contains("complete"));
    }
}
