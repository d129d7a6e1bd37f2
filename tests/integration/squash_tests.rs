use super::test_helpers::*;
use git_at::config::{GitConfigStore, SquashSettings};
use git_at::errors::{AtError, Result as AtResult, SquashWarning};
use git_at::git::{GitCli, GitExecutor, GitRepository};
use git_at::squash::{ResolutionSource, SquashReport, Squasher, STASH_LABEL_PREFIX};
use std::collections::HashMap;
use std::path::Path;

fn squash(repo_path: &Path, target: Option<&str>, message: Option<&str>) -> AtResult<SquashReport> {
    let repo = GitRepository::open(repo_path).unwrap();
    let config = GitConfigStore::open(repo_path).unwrap();
    Squasher::new(&repo, &config)?.squash(target, message)
}

fn no_temporary_branches(repo_path: &Path) -> bool {
    branches(repo_path).iter().all(|b| !b.contains("-squash-"))
}

/// Delegates to the real git binary but fails selected commands
struct FailingGit {
    inner: GitCli,
    fail_prefix: Vec<&'static str>,
}

impl GitExecutor for FailingGit {
    fn execute(&self, args: &[&str]) -> AtResult<String> {
        if args.starts_with(&self.fail_prefix) {
            return Err(AtError::Command {
                command: args.join(" "),
                code: Some(128),
                stderr: "injected failure".to_string(),
            });
        }
        self.inner.execute(args)
    }
}

fn failing_repo(repo_path: &Path, fail_prefix: Vec<&'static str>) -> GitRepository<FailingGit> {
    GitRepository::with_executor(
        repo_path,
        FailingGit {
            inner: GitCli::new(repo_path),
            fail_prefix,
        },
    )
}

/// `main` with a commit touching `shared.txt` after `feature` branched off,
/// and `feature` whose second commit edits the same line
fn create_conflicting_branches(repo_path: &Path) -> Vec<String> {
    commit_file(repo_path, "shared.txt", "base\n", "Add shared file");
    git(repo_path, &["checkout", "--quiet", "-b", "feature-x"]);
    let first = commit_file(repo_path, "a.txt", "a\n", "Add a");
    let second = commit_file(repo_path, "shared.txt", "feature\n", "Edit shared on feature");
    let third = commit_file(repo_path, "b.txt", "b\n", "Add b");

    git(repo_path, &["checkout", "--quiet", "main"]);
    commit_file(repo_path, "shared.txt", "main\n", "Edit shared on main");
    git(repo_path, &["checkout", "--quiet", "feature-x"]);

    vec![first, second, third]
}

#[test]
fn test_zero_or_one_commit_is_noop() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);

    let report = squash(&repo_path, Some("main"), Some("msg")).unwrap();
    assert!(report.is_noop());

    let only = commit_file(&repo_path, "a.txt", "a\n", "Only commit");
    write_file(&repo_path, "README.md", "dirty\n");
    let before_status = status(&repo_path);

    let report = squash(&repo_path, Some("main"), Some("msg")).unwrap();
    assert!(report.is_noop());
    assert_eq!(report.commits_consolidated, 0);
    assert_eq!(report.new_head, only);
    assert_eq!(head(&repo_path), only);
    assert_eq!(status(&repo_path), before_status);
    assert_eq!(stash_count(&repo_path), 0);
}

#[test]
fn test_squash_preserves_tree_and_leaves_one_commit() {
    let (_tmp, repo_path) = create_test_git_repo();
    let main_tip = head(&repo_path);
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 4, "feature");
    let tree_before = tree(&repo_path, "HEAD");

    let report = squash(&repo_path, Some("main"), Some("Add feature")).unwrap();

    assert_eq!(report.commits_consolidated, 4);
    assert_eq!(report.target_source, None);
    assert_eq!(tree(&repo_path, "feature"), tree_before);
    assert_eq!(count_between(&repo_path, "main", "feature"), 1);
    assert_eq!(rev_parse(&repo_path, "feature~1"), main_tip);
    assert_eq!(subject(&repo_path, "feature"), "Add feature");
    assert_eq!(report.new_head, rev_parse(&repo_path, "feature"));
    assert_eq!(current_branch(&repo_path), "feature");
    assert!(no_temporary_branches(&repo_path));
    assert!(report.warnings.is_empty());
}

#[test]
fn test_feature_three_commits_ahead_of_develop() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "develop"]);
    commit_file(&repo_path, "develop.txt", "develop\n", "Develop work");
    git(&repo_path, &["checkout", "--quiet", "-b", "feature-x"]);
    create_test_commits(&repo_path, 3, "x");
    git(&repo_path, &["config", "at.trunk", "develop"]);

    let report = squash(&repo_path, None, Some("combined change")).unwrap();

    // develop is a local branch sharing history, so the merge-base scan finds
    // it before the trunk setting is consulted
    assert_eq!(report.commits_consolidated, 3);
    assert_eq!(report.target, "develop");
    assert_eq!(report.target_source, Some(ResolutionSource::Divergence));
    assert_eq!(count_between(&repo_path, "develop", "feature-x"), 1);
    assert_eq!(subject(&repo_path, "feature-x"), "combined change");
    assert_eq!(branches(&repo_path), vec!["develop", "feature-x", "main"]);
}

#[test]
fn test_trunk_target_when_no_local_branch_shares_history() {
    let (_tmp, repo_path) = create_test_git_repo();
    commit_file(&repo_path, "develop.txt", "develop\n", "Develop work");
    let develop_tip = head(&repo_path);
    git(&repo_path, &["update-ref", "refs/remotes/origin/develop", &develop_tip]);
    git(&repo_path, &["checkout", "--quiet", "-b", "feature-x"]);
    git(&repo_path, &["branch", "-D", "main"]);
    create_test_commits(&repo_path, 3, "x");
    git(&repo_path, &["config", "at.trunk", "origin/develop"]);

    let report = squash(&repo_path, None, Some("combined change")).unwrap();

    assert_eq!(report.target, "origin/develop");
    assert_eq!(report.target_source, Some(ResolutionSource::Trunk));
    assert_eq!(report.commits_consolidated, 3);
    assert_eq!(count_between(&repo_path, "origin/develop", "feature-x"), 1);
    assert_eq!(rev_parse(&repo_path, "feature-x~1"), develop_tip);
}

#[test]
fn test_branch_already_merged_into_parent_is_left_alone() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "develop"]);
    commit_file_at(&repo_path, "develop.txt", "d\n", "Develop work", 1_700_000_000);
    git(&repo_path, &["checkout", "--quiet", "-b", "feature", "main"]);
    for i in 1..=3 {
        commit_file_at(
            &repo_path,
            &format!("f{i}.txt"),
            "f\n",
            &format!("Feature {i}"),
            1_700_000_100 + i,
        );
    }
    git(&repo_path, &["branch", "-f", "main", "feature"]);
    let original_head = head(&repo_path);

    let report = squash(&repo_path, None, Some("x")).unwrap();

    assert_eq!(report.target, "main");
    assert_eq!(report.target_source, Some(ResolutionSource::Divergence));
    assert!(report.is_noop());
    assert_eq!(head(&repo_path), original_head);
    assert_eq!(count_between(&repo_path, "develop", "feature"), 3);
}

#[cfg(unix)]
#[test]
fn test_commit_hooks_do_not_block_collapse() {
    use std::os::unix::fs::PermissionsExt;

    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    let tree_before = tree(&repo_path, "HEAD");

    for hook in ["pre-commit", "commit-msg"] {
        let path = repo_path.join(".git/hooks").join(hook);
        std::fs::write(&path, "#!/bin/sh\necho rejected >> hooked.txt\nexit 1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let report = squash(&repo_path, Some("main"), Some("Combined")).unwrap();

    assert_eq!(report.commits_consolidated, 2);
    assert_eq!(tree(&repo_path, "feature"), tree_before);
    assert!(!repo_path.join("hooked.txt").exists());
}

#[test]
fn test_conflict_on_second_commit_leaves_branch_unchanged() {
    let (_tmp, repo_path) = create_test_git_repo();
    let commits = create_conflicting_branches(&repo_path);
    let original_head = head(&repo_path);

    let err = squash(&repo_path, Some("main"), Some("combined")).unwrap_err();

    match &err {
        AtError::Conflict {
            commit,
            subject,
            conflicted_files,
            warnings,
            ..
        } => {
            assert_eq!(commit, &commits[1]);
            assert_eq!(subject, "Edit shared on feature");
            assert_eq!(conflicted_files, &vec!["shared.txt".to_string()]);
            assert!(warnings.is_empty());
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    assert_eq!(rev_parse(&repo_path, "feature-x"), original_head);
    assert_eq!(current_branch(&repo_path), "feature-x");
    assert!(no_temporary_branches(&repo_path));
    assert!(!repo_path.join(".git/CHERRY_PICK_HEAD").exists());
    assert_eq!(status(&repo_path), "");
    assert_eq!(read_file(&repo_path, "shared.txt"), "feature\n");
}

#[test]
fn test_dirty_tree_restored_after_success() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");

    write_file(&repo_path, "README.md", "unstaged edit\n");
    write_file(&repo_path, "feature_1.txt", "staged edit\n");
    git(&repo_path, &["add", "feature_1.txt"]);
    let before_status = status(&repo_path);

    let report = squash(&repo_path, Some("main"), None).unwrap();

    assert_eq!(report.commits_consolidated, 2);
    assert!(report.warnings.is_empty());
    assert_eq!(status(&repo_path), before_status);
    assert_eq!(read_file(&repo_path, "README.md"), "unstaged edit\n");
    assert_eq!(read_file(&repo_path, "feature_1.txt"), "staged edit\n");
    assert_eq!(stash_count(&repo_path), 0);
}

#[test]
fn test_dirty_tree_restored_after_conflict() {
    let (_tmp, repo_path) = create_test_git_repo();
    create_conflicting_branches(&repo_path);
    write_file(&repo_path, "README.md", "work in progress\n");
    let before_status = status(&repo_path);

    let err = squash(&repo_path, Some("main"), None).unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(status(&repo_path), before_status);
    assert_eq!(read_file(&repo_path, "README.md"), "work in progress\n");
    assert_eq!(stash_count(&repo_path), 0);
}

#[test]
fn test_unrelated_stash_entries_survive() {
    let (_tmp, repo_path) = create_test_git_repo();
    write_file(&repo_path, "README.md", "older work\n");
    git(&repo_path, &["stash", "push", "--quiet", "-m", "older work"]);

    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    write_file(&repo_path, "feature_2.txt", "newer work\n");

    squash(&repo_path, Some("main"), None).unwrap();

    assert_eq!(read_file(&repo_path, "feature_2.txt"), "newer work\n");
    let stashes = git(&repo_path, &["stash", "list", "--format=%s"]);
    assert_eq!(stashes.lines().count(), 1);
    assert!(stashes.ends_with("older work"));
}

#[test]
fn test_cleanup_failure_is_a_warning() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    let tree_before = tree(&repo_path, "HEAD");

    let repo = failing_repo(&repo_path, vec!["branch", "-D"]);
    let config: HashMap<String, String> = HashMap::new();
    let report = Squasher::new(&repo, &config)
        .unwrap()
        .squash(Some("main"), Some("Combined"))
        .unwrap();

    assert_eq!(report.commits_consolidated, 2);
    assert_eq!(tree(&repo_path, "feature"), tree_before);
    assert_eq!(report.warnings.len(), 1);
    let SquashWarning::CleanupFailure { branch, reason } = &report.warnings[0] else {
        panic!("expected cleanup failure, got {:?}", report.warnings);
    };
    assert!(branch.starts_with("feature-squash-"));
    assert!(reason.contains("injected failure"));
    assert!(branches(&repo_path).contains(branch));
    assert_eq!(current_branch(&repo_path), "feature");
}

#[test]
fn test_stash_restore_failure_keeps_entry() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    write_file(&repo_path, "README.md", "precious\n");

    let repo = failing_repo(&repo_path, vec!["stash", "pop"]);
    let config: HashMap<String, String> = HashMap::new();
    let report = Squasher::new(&repo, &config)
        .unwrap()
        .squash(Some("main"), Some("Combined"))
        .unwrap();

    assert_eq!(report.commits_consolidated, 2);
    let SquashWarning::StashRestoreFailure { label, .. } = &report.warnings[0] else {
        panic!("expected stash restore failure, got {:?}", report.warnings);
    };
    assert!(label.starts_with(STASH_LABEL_PREFIX));

    let stashes = git(&repo_path, &["stash", "list", "--format=%s"]);
    assert!(stashes.ends_with(label.as_str()));
    git(&repo_path, &["stash", "pop", "--quiet"]);
    assert_eq!(read_file(&repo_path, "README.md"), "precious\n");
}

#[test]
fn test_autostash_disabled_refuses_dirty_tree() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    let original_head = head(&repo_path);
    git(&repo_path, &["config", "at.squash.autostash", "false"]);
    write_file(&repo_path, "README.md", "dirty\n");

    let err = squash(&repo_path, Some("main"), None).unwrap_err();

    assert!(matches!(err, AtError::Validation(_)));
    assert_eq!(head(&repo_path), original_head);
    assert_eq!(read_file(&repo_path, "README.md"), "dirty\n");
    assert_eq!(stash_count(&repo_path), 0);
}

#[test]
fn test_merge_commits_are_rejected() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    commit_file(&repo_path, "a.txt", "a\n", "Add a");
    git(&repo_path, &["checkout", "--quiet", "-b", "side"]);
    commit_file(&repo_path, "side.txt", "side\n", "Side work");
    git(&repo_path, &["checkout", "--quiet", "feature"]);
    commit_file(&repo_path, "b.txt", "b\n", "Add b");
    git(&repo_path, &["merge", "--quiet", "--no-ff", "--no-edit", "side"]);
    let original_head = head(&repo_path);

    let err = squash(&repo_path, Some("main"), None).unwrap_err();

    match err {
        AtError::Validation(msg) => assert!(msg.contains("merge commit")),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(head(&repo_path), original_head);
    assert!(no_temporary_branches(&repo_path));
}

#[test]
fn test_unknown_target_and_detached_head() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");

    let err = squash(&repo_path, Some("no-such-branch"), None).unwrap_err();
    assert!(err.is_not_found());

    let tip = head(&repo_path);
    git(&repo_path, &["checkout", "--quiet", "--detach", &tip]);
    let err = squash(&repo_path, Some("main"), None).unwrap_err();
    assert!(matches!(err, AtError::Branch(_)));
    assert_eq!(head(&repo_path), tip);
}

#[test]
fn test_explicit_commit_target() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    let commits = create_test_commits(&repo_path, 4, "feature");

    // Squash only the last three commits
    let report = squash(&repo_path, Some(&commits[0]), Some("Last three")).unwrap();

    assert_eq!(report.commits_consolidated, 3);
    assert_eq!(count_between(&repo_path, "main", "feature"), 2);
    assert_eq!(rev_parse(&repo_path, "feature~1"), commits[0]);
}

#[test]
fn test_branch_prefix_is_used_for_temporary_branch() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");

    let repo = failing_repo(&repo_path, vec!["branch", "-D"]);
    let config: HashMap<String, String> = HashMap::new();
    let settings = SquashSettings {
        branch_prefix: Some("squash-tmp".to_string()),
        ..SquashSettings::default()
    };
    let report = Squasher::with_settings(&repo, &config, settings)
        .squash(Some("main"), None)
        .unwrap();

    let SquashWarning::CleanupFailure { branch, .. } = &report.warnings[0] else {
        panic!("expected cleanup failure");
    };
    assert!(branch.starts_with("squash-tmp/feature-squash-"));
}

#[test]
fn test_report_source_for_detected_target() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    git(&repo_path, &["branch", "--set-upstream-to=main"]);

    let report = squash(&repo_path, None, None).unwrap();

    assert_eq!(report.target, "main");
    assert_eq!(report.target_source, Some(ResolutionSource::UpstreamMerge));
    assert_eq!(report.message.as_deref(), Some("feature: commit 2"));
}

#[test]
fn test_pr_squash_keeps_fork_point() {
    let (_tmp, repo_path) = create_test_git_repo();
    let fork_point = head(&repo_path);
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 3, "feature");
    let tree_before = tree(&repo_path, "HEAD");
    git(&repo_path, &["checkout", "--quiet", "main"]);
    commit_file(&repo_path, "main.txt", "main\n", "Later trunk work");
    git(&repo_path, &["checkout", "--quiet", "feature"]);

    let repo = GitRepository::open(&repo_path).unwrap();
    let config = GitConfigStore::open(&repo_path).unwrap();
    let report = Squasher::new(&repo, &config)
        .unwrap()
        .squash_for_pr(Some("Feature for review"))
        .unwrap();

    assert_eq!(report.target, "main");
    assert_eq!(report.target_source, Some(ResolutionSource::TrunkMergeBase));
    assert_eq!(report.commits_consolidated, 3);
    assert_eq!(rev_parse(&repo_path, "feature~1"), fork_point);
    assert_eq!(tree(&repo_path, "feature"), tree_before);
    assert_eq!(subject(&repo_path, "feature"), "Feature for review");
    assert!(no_temporary_branches(&repo_path));
}

#[test]
fn test_pr_squash_uses_configured_trunk() {
    let (_tmp, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "develop"]);
    let develop_tip = commit_file(&repo_path, "develop.txt", "d\n", "Develop work");
    git(&repo_path, &["checkout", "--quiet", "-b", "feature"]);
    create_test_commits(&repo_path, 2, "feature");
    git(&repo_path, &["config", "at.trunk", "develop"]);

    let repo = GitRepository::open(&repo_path).unwrap();
    let config = GitConfigStore::open(&repo_path).unwrap();
    let squasher = Squasher::new(&repo, &config).unwrap();

    let preview = squasher.preview_for_pr().unwrap();
    assert_eq!(preview.target, "develop");
    assert_eq!(preview.target_commit(), develop_tip);
    assert_eq!(preview.range.len(), 2);

    let report = squasher.squash_for_pr(None).unwrap();
    assert_eq!(report.commits_consolidated, 2);
    assert_eq!(count_between(&repo_path, "develop", "feature"), 1);
}
