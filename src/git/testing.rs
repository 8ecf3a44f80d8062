// Scripted in-memory git used by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{CommandOutput, CommandRunner, describe};
use crate::error::CheckpointError;

pub const DEFAULT_TOPLEVEL: &str = "/work/repo";

#[derive(Debug)]
struct FakeState {
    calls: Vec<Vec<String>>,
    branches: Vec<String>,
    current: String,
    tips: HashMap<String, String>,
    /// Tree of every commit or stash object
    trees: HashMap<String, String>,
    /// Tree of the tracked files in the working directory
    worktree: String,
    next_id: u64,
    remotes: String,
    toplevel: Option<String>,
    push_failures: usize,
    snapshot_timeouts: usize,
    credential_helper: Option<String>,
    fail_config: bool,
    fail_branch_create: bool,
}

impl FakeState {
    fn new_object(&mut self) -> String {
        self.next_id += 1;
        format!("{:040x}", 0x1a2b3c4_u64 + self.next_id)
    }

    fn head(&self) -> Option<&String> {
        self.tips.get(&self.current)
    }

    fn resolve(&self, rev: &str) -> Option<String> {
        if let Some(base) = rev.strip_suffix("^{tree}") {
            let commit = self.resolve(base)?;
            return self.trees.get(&commit).cloned();
        }
        match rev {
            "HEAD" => self.head().cloned(),
            _ => match rev.strip_prefix("refs/heads/") {
                Some(branch) => self.tips.get(branch).cloned(),
                None => self.trees.contains_key(rev).then(|| rev.to_string()),
            },
        }
    }
}

/// Minimal stand-in for the git binary
///
/// Tracks branch tips and trees well enough for the checkpoint plumbing:
/// the working tree is "clean" until [`FakeGit::edit_worktree`] is called.
#[derive(Debug)]
pub struct FakeGit {
    state: Mutex<FakeState>,
}

impl FakeGit {
    pub fn new() -> Self {
        let mut state = FakeState {
            calls: Vec::new(),
            branches: vec!["main".to_string()],
            current: "main".to_string(),
            tips: HashMap::new(),
            trees: HashMap::new(),
            worktree: "tree-0".to_string(),
            next_id: 0,
            remotes: String::new(),
            toplevel: Some(DEFAULT_TOPLEVEL.to_string()),
            push_failures: 0,
            snapshot_timeouts: 0,
            credential_helper: None,
            fail_config: false,
            fail_branch_create: false,
        };
        let root = state.new_object();
        state.trees.insert(root.clone(), "tree-0".to_string());
        state.tips.insert("main".to_string(), root);

        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_remotes(self, listing: &str) -> Self {
        self.state.lock().unwrap().remotes = listing.to_string();
        self
    }

    /// An existing branch pointing at HEAD
    pub fn with_branch(self, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let head = state.head().cloned().unwrap();
            state.branches.push(name.to_string());
            state.tips.insert(name.to_string(), head);
        }
        self
    }

    pub fn with_credential_helper(self, helper: &str) -> Self {
        self.state.lock().unwrap().credential_helper = Some(helper.to_string());
        self
    }

    /// Answer `rev-parse --show-toplevel` as if run outside any work tree
    pub fn outside_repository(self) -> Self {
        self.state.lock().unwrap().toplevel = None;
        self
    }

    pub fn failing_config(self) -> Self {
        self.state.lock().unwrap().fail_config = true;
        self
    }

    pub fn failing_branch_create(self) -> Self {
        self.state.lock().unwrap().fail_branch_create = true;
        self
    }

    /// Modify a tracked file in the working directory
    pub fn edit_worktree(&self) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.worktree = format!("tree-{}", state.next_id);
    }

    pub fn fail_next_pushes(&self, count: usize) {
        self.state.lock().unwrap().push_failures = count;
    }

    /// Make the next `count` working tree snapshots run out of time
    pub fn time_out_next_snapshots(&self, count: usize) {
        self.state.lock().unwrap().snapshot_timeouts = count;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose first argument is `subcommand`
    pub fn calls_to(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|call| call.first().map(String::as_str) == Some(subcommand))
            .collect()
    }

    pub fn current_branch(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }

    pub fn branch_tip(&self, branch: &str) -> Option<String> {
        self.state.lock().unwrap().tips.get(branch).cloned()
    }

    pub fn credential_helper(&self) -> Option<String> {
        self.state.lock().unwrap().credential_helper.clone()
    }
}

#[async_trait]
impl CommandRunner for FakeGit {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, CheckpointError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(args.iter().map(|a| a.to_string()).collect());

        let ok = |text: &str| CommandOutput::new(text, Some(0));
        let fail = |text: &str| CommandOutput::new(text, Some(1));

        let output = match args {
            ["branch", "--list", ..] => {
                let listing: String = state
                    .branches
                    .iter()
                    .map(|b| {
                        let marker = if *b == state.current { "* " } else { "  " };
                        format!("{marker}{b}\n")
                    })
                    .collect();
                ok(&listing)
            }
            ["branch", name] => {
                if state.fail_branch_create {
                    fail("fatal: not a valid object name: 'HEAD'\n")
                } else {
                    let head = state.head().cloned().unwrap_or_default();
                    state.branches.push(name.to_string());
                    state.tips.insert(name.to_string(), head);
                    ok("")
                }
            }
            ["remote", "-v"] => ok(&state.remotes.clone()),
            ["rev-parse", "--show-toplevel"] => match state.toplevel.clone() {
                Some(toplevel) => ok(&format!("{toplevel}\n")),
                None => fail("fatal: not a git repository (or any of the parent directories): .git\n"),
            },
            ["stash", "create"] => {
                if state.snapshot_timeouts > 0 {
                    state.snapshot_timeouts -= 1;
                    return Err(CheckpointError::CommandTimedOut {
                        command: describe(args),
                        timeout: Duration::from_secs(120),
                    });
                }
                let head_tree = state.resolve("HEAD^{tree}");
                if head_tree.as_deref() == Some(state.worktree.as_str()) {
                    ok("")
                } else {
                    let id = state.new_object();
                    let tree = state.worktree.clone();
                    state.trees.insert(id.clone(), tree);
                    ok(&format!("{id}\n"))
                }
            }
            ["rev-parse", "--verify", rev] => match state.resolve(rev) {
                Some(object) => ok(&format!("{object}\n")),
                None => fail("fatal: Needed a single revision\n"),
            },
            ["commit-tree", tree, "-p", parent, "-m", _] => {
                if state.trees.contains_key(*parent) {
                    let id = state.new_object();
                    state.trees.insert(id.clone(), tree.to_string());
                    ok(&format!("{id}\n"))
                } else {
                    fail(&format!("fatal: not a valid object name {parent}\n"))
                }
            }
            ["update-ref", reference, new, old] => {
                let branch = reference.trim_start_matches("refs/heads/").to_string();
                if state.tips.get(&branch).map(String::as_str) == Some(*old) {
                    state.tips.insert(branch, new.to_string());
                    ok("")
                } else {
                    fail(&format!("fatal: cannot lock ref '{reference}'\n"))
                }
            }
            ["push", ..] => {
                if state.push_failures > 0 {
                    state.push_failures -= 1;
                    fail("error: failed to push some refs\n")
                } else {
                    ok("")
                }
            }
            ["config", "--get", "credential.helper"] => match &state.credential_helper {
                Some(helper) => ok(&format!("{helper}\n")),
                None => fail(""),
            },
            ["config", "credential.helper", value] => {
                if state.fail_config {
                    fail("error: could not lock config file\n")
                } else {
                    state.credential_helper = Some(value.to_string());
                    ok("")
                }
            }
            _ => ok(""),
        };

        Ok(output)
    }
}
