//! Task verification workflow
//!
//! Submissions for one (account, task) pair live in a slot guarded by its
//! own mutex. The allowance check and the insert happen under that lock, as
//! does the pending -> terminal transition and its ledger credit.

use crate::error::{EconomyError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use points_core::{AccountId, AuditAction, AuditLog, AuditLogEntry, LedgerStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_PROOF_LEN: usize = 4096;
const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Social,
    Daily,
    OneTime,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    Manual,
    Auto,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Paused,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub points_reward: u64,
    pub task_type: TaskType,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// `None` means unlimited
    pub max_completions_per_user: Option<u32>,
    pub verification_type: VerificationType,
    pub status: TaskStatus,
    pub created_by: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Active and inside its availability window
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Active
            && self.starts_at.map_or(true, |start| now >= start)
            && self.ends_at.map_or(true, |end| now < end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub points_reward: u64,
    pub task_type: TaskType,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_completions_per_user: Option<u32>,
    pub verification_type: VerificationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Verified,
    Rejected,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "pending"),
            SubmissionStatus::Verified => write!(f, "verified"),
            SubmissionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Result of an automated membership check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed(String),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub id: String,
    pub account_id: AccountId,
    pub task_id: String,
    pub status: SubmissionStatus,
    pub proof: String,
    /// Frozen at verification
    pub points_awarded: Option<u64>,
    /// `None` once reviewed means an automated verification
    pub reviewed_by: Option<AccountId>,
    pub rejection_reason: Option<String>,
    pub auto_check: Option<CheckOutcome>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { reason: Option<String> },
}

/// External check for tasks verified automatically (e.g. channel membership).
/// Runs before any lock is taken.
pub trait MembershipCheck: Send + Sync {
    fn check<'a>(
        &'a self,
        account_id: &'a str,
        task: &'a Task,
        proof: &'a str,
    ) -> BoxFuture<'a, CheckOutcome>;
}

/// Default collaborator: no external service wired in
pub struct UnavailableCheck;

impl MembershipCheck for UnavailableCheck {
    fn check<'a>(
        &'a self,
        _account_id: &'a str,
        _task: &'a Task,
        _proof: &'a str,
    ) -> BoxFuture<'a, CheckOutcome> {
        Box::pin(async { CheckOutcome::Unavailable })
    }
}

type SlotKey = (AccountId, String);
type Slot = Arc<Mutex<Vec<TaskSubmission>>>;

pub struct TaskBoard {
    ledger: Arc<LedgerStore>,
    audit: Arc<AuditLog>,
    tasks: DashMap<String, Task>,
    slots: DashMap<SlotKey, Slot>,
    /// submission id -> slot key
    index: DashMap<String, SlotKey>,
}

impl TaskBoard {
    pub fn new(ledger: Arc<LedgerStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            ledger,
            audit,
            tasks: DashMap::new(),
            slots: DashMap::new(),
            index: DashMap::new(),
        }
    }

    pub fn restore(
        ledger: Arc<LedgerStore>,
        audit: Arc<AuditLog>,
        tasks: Vec<Task>,
        submissions: Vec<TaskSubmission>,
    ) -> Self {
        let board = Self::new(ledger, audit);
        for task in tasks {
            board.tasks.insert(task.id.clone(), task);
        }
        for submission in submissions {
            let key = (submission.account_id.clone(), submission.task_id.clone());
            board.index.insert(submission.id.clone(), key.clone());
            board.slot(key).lock().push(submission);
        }
        board
    }

    fn slot(&self, key: SlotKey) -> Slot {
        self.slots.entry(key).or_default().value().clone()
    }

    pub fn create_task(&self, actor: &str, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
        let title = new.title.trim();
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(EconomyError::InvalidInput(format!(
                "title must be 1 to {} characters",
                MAX_TITLE_LEN
            )));
        }
        if new.points_reward == 0 {
            return Err(EconomyError::InvalidInput(
                "points_reward must be positive".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (new.starts_at, new.ends_at) {
            if end <= start {
                return Err(EconomyError::InvalidInput(
                    "ends_at must be after starts_at".to_string(),
                ));
            }
        }
        if new.max_completions_per_user == Some(0) {
            return Err(EconomyError::InvalidInput(
                "max_completions_per_user must be positive".to_string(),
            ));
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: new.description,
            points_reward: new.points_reward,
            task_type: new.task_type,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            max_completions_per_user: new.max_completions_per_user,
            verification_type: new.verification_type,
            status: TaskStatus::Active,
            created_by: actor.to_string(),
            created_at: now,
        };
        self.tasks.insert(task.id.clone(), task.clone());

        self.audit.append(
            AuditLogEntry::new(AuditAction::TaskCreated, now)
                .actor(actor)
                .meta("task_id", &task.id)
                .meta("points_reward", task.points_reward),
        );
        info!(task = %task.id, reward = task.points_reward, "Task created");
        Ok(task)
    }

    pub fn set_task_status(
        &self,
        actor: &str,
        task_id: &str,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let (prior, task) = {
            let mut task = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| EconomyError::TaskNotFound(task_id.to_string()))?;
            let prior = task.status;
            task.status = status;
            (prior, task.clone())
        };

        self.audit.append(
            AuditLogEntry::new(AuditAction::TaskStatusChanged, now)
                .actor(actor)
                .meta("task_id", task_id)
                .meta("prior", prior)
                .meta("result", status),
        );
        Ok(task)
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    /// All tasks, newest first
    pub fn list_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|t| t.value().clone()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        tasks
    }

    /// Tasks currently accepting submissions
    pub fn open_tasks(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.list_tasks()
            .into_iter()
            .filter(|t| t.is_open(now))
            .collect()
    }

    /// Submit proof for a task. `auto_check` is the outcome of the membership
    /// check for auto-verified tasks, computed by the caller beforehand.
    pub fn submit(
        &self,
        account_id: &str,
        task_id: &str,
        proof: String,
        auto_check: Option<CheckOutcome>,
        now: DateTime<Utc>,
    ) -> Result<TaskSubmission> {
        if proof.len() > MAX_PROOF_LEN {
            return Err(EconomyError::InvalidInput(format!(
                "proof exceeds {} bytes",
                MAX_PROOF_LEN
            )));
        }
        let account = self
            .ledger
            .get(account_id)
            .ok_or_else(|| EconomyError::UserNotFound(account_id.to_string()))?;
        if !account.is_active() {
            return Err(EconomyError::AccountSuspended(account_id.to_string()));
        }
        let task = self
            .task(task_id)
            .ok_or_else(|| EconomyError::TaskNotFound(task_id.to_string()))?;
        if !task.is_open(now) {
            return Err(EconomyError::TaskInactive(task_id.to_string()));
        }

        let slot = self.slot((account_id.to_string(), task_id.to_string()));
        let mut submissions = slot.lock();

        if submissions
            .iter()
            .any(|s| s.status == SubmissionStatus::Pending)
        {
            return Err(EconomyError::AlreadySubmitted(task_id.to_string()));
        }
        if let Some(max) = task.max_completions_per_user {
            let used = submissions
                .iter()
                .filter(|s| s.status != SubmissionStatus::Rejected)
                .count();
            if used >= max as usize {
                return Err(EconomyError::AlreadySubmitted(task_id.to_string()));
            }
        }

        let mut submission = TaskSubmission {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            task_id: task_id.to_string(),
            status: SubmissionStatus::Pending,
            proof,
            points_awarded: None,
            reviewed_by: None,
            rejection_reason: None,
            auto_check: auto_check.clone(),
            submitted_at: now,
            reviewed_at: None,
        };

        let auto_verified = task.verification_type == VerificationType::Auto
            && auto_check == Some(CheckOutcome::Passed);
        let new_balance = if auto_verified {
            let balance = self.ledger.credit(account_id, task.points_reward)?;
            submission.status = SubmissionStatus::Verified;
            submission.points_awarded = Some(task.points_reward);
            submission.reviewed_at = Some(now);
            Some(balance)
        } else {
            None
        };

        submissions.push(submission.clone());
        self.index.insert(
            submission.id.clone(),
            (account_id.to_string(), task_id.to_string()),
        );
        drop(submissions);

        self.audit.append(
            AuditLogEntry::new(AuditAction::TaskSubmitted, now)
                .actor(account_id)
                .target(account_id)
                .meta("task_id", task_id)
                .meta("submission_id", &submission.id),
        );
        if let Some(new_balance) = new_balance {
            self.audit.append(
                AuditLogEntry::new(AuditAction::TaskVerified, now)
                    .target(account_id)
                    .meta("submission_id", &submission.id)
                    .meta("amount", task.points_reward)
                    .meta("new_balance", new_balance)
                    .meta("reviewer", "system"),
            );
            info!(account = %account_id, task = %task_id, amount = task.points_reward, "Task auto-verified");
        } else if let Some(outcome) = &auto_check {
            if *outcome != CheckOutcome::Passed {
                warn!(account = %account_id, task = %task_id, ?outcome, "Automated check inconclusive; left for review");
            }
        }

        Ok(submission)
    }

    /// Move a pending submission to verified (crediting the task's current
    /// reward) or rejected
    pub fn review(
        &self,
        submission_id: &str,
        decision: ReviewDecision,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<TaskSubmission> {
        let key = self
            .index
            .get(submission_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EconomyError::SubmissionNotFound(submission_id.to_string()))?;
        let slot = self.slot(key);
        let mut submissions = slot.lock();
        let submission = submissions
            .iter_mut()
            .find(|s| s.id == submission_id)
            .ok_or_else(|| EconomyError::SubmissionNotFound(submission_id.to_string()))?;

        if submission.status != SubmissionStatus::Pending {
            return Err(EconomyError::AlreadyFinalized(submission_id.to_string()));
        }

        let entry = match decision {
            ReviewDecision::Approve => {
                let reward = self
                    .task(&submission.task_id)
                    .map(|t| t.points_reward)
                    .ok_or_else(|| EconomyError::TaskNotFound(submission.task_id.clone()))?;
                let new_balance = self.ledger.credit(&submission.account_id, reward)?;
                submission.status = SubmissionStatus::Verified;
                submission.points_awarded = Some(reward);
                info!(
                    account = %submission.account_id,
                    submission = %submission_id,
                    amount = reward,
                    "Submission verified"
                );
                AuditLogEntry::new(AuditAction::TaskVerified, now)
                    .meta("amount", reward)
                    .meta("new_balance", new_balance)
            }
            ReviewDecision::Reject { reason } => {
                submission.status = SubmissionStatus::Rejected;
                submission.rejection_reason = reason.clone();
                info!(submission = %submission_id, "Submission rejected");
                AuditLogEntry::new(AuditAction::TaskRejected, now)
                    .meta("reason", reason.unwrap_or_default())
            }
        };
        submission.reviewed_by = Some(reviewer.to_string());
        submission.reviewed_at = Some(now);
        let finalized = submission.clone();
        drop(submissions);

        self.audit.append(
            entry
                .actor(reviewer)
                .target(finalized.account_id.as_str())
                .meta("submission_id", submission_id)
                .meta("task_id", &finalized.task_id),
        );
        Ok(finalized)
    }

    pub fn submission(&self, submission_id: &str) -> Option<TaskSubmission> {
        let key = self.index.get(submission_id).map(|e| e.value().clone())?;
        let slot = self.slot(key);
        let submissions = slot.lock();
        submissions.iter().find(|s| s.id == submission_id).cloned()
    }

    fn all_submissions(&self) -> Vec<TaskSubmission> {
        let slots: Vec<Slot> = self.slots.iter().map(|e| e.value().clone()).collect();
        let mut all: Vec<TaskSubmission> = slots
            .iter()
            .flat_map(|slot| slot.lock().clone())
            .collect();
        all.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Pending submissions, oldest first
    pub fn pending_submissions(&self) -> Vec<TaskSubmission> {
        self.all_submissions()
            .into_iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .collect()
    }

    pub fn submissions_of(&self, account_id: &str) -> Vec<TaskSubmission> {
        self.all_submissions()
            .into_iter()
            .filter(|s| s.account_id == account_id)
            .collect()
    }

    pub fn snapshot(&self) -> (Vec<Task>, Vec<TaskSubmission>) {
        let mut tasks = self.list_tasks();
        tasks.reverse();
        (tasks, self.all_submissions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use points_core::Account;

    fn setup() -> (TaskBoard, Arc<LedgerStore>, DateTime<Utc>) {
        let now = Utc::now();
        let ledger = Arc::new(LedgerStore::new());
        ledger
            .open_account(Account::new("alice".into(), "Alice".into(), "ALICE001".into(), now))
            .unwrap();
        (TaskBoard::new(ledger.clone(), Arc::new(AuditLog::new())), ledger, now)
    }

    fn new_task(verification_type: VerificationType, max: Option<u32>) -> NewTask {
        NewTask {
            title: "Join the channel".to_string(),
            description: String::new(),
            points_reward: 300,
            task_type: TaskType::Social,
            starts_at: None,
            ends_at: None,
            max_completions_per_user: max,
            verification_type,
        }
    }

    #[test]
    fn test_manual_approve_credits_once() {
        let (board, ledger, now) = setup();
        let task = board
            .create_task("admin", new_task(VerificationType::Manual, Some(1)), now)
            .unwrap();

        let sub = board
            .submit("alice", &task.id, "https://proof".into(), None, now)
            .unwrap();
        assert_eq!(sub.status, SubmissionStatus::Pending);
        assert_eq!(board.pending_submissions().len(), 1);

        let done = board
            .review(&sub.id, ReviewDecision::Approve, "admin", now)
            .unwrap();
        assert_eq!(done.status, SubmissionStatus::Verified);
        assert_eq!(done.points_awarded, Some(300));
        assert_eq!(ledger.balance("alice").unwrap(), 300);

        assert_eq!(
            board.review(&sub.id, ReviewDecision::Reject { reason: None }, "admin", now),
            Err(EconomyError::AlreadyFinalized(sub.id.clone()))
        );
        assert_eq!(ledger.balance("alice").unwrap(), 300);
    }

    #[test]
    fn test_pending_blocks_resubmission_and_rejection_frees_allowance() {
        let (board, _, now) = setup();
        let task = board
            .create_task("admin", new_task(VerificationType::Manual, Some(1)), now)
            .unwrap();

        let first = board.submit("alice", &task.id, "a".into(), None, now).unwrap();
        assert!(matches!(
            board.submit("alice", &task.id, "b".into(), None, now),
            Err(EconomyError::AlreadySubmitted(_))
        ));

        board
            .review(&first.id, ReviewDecision::Reject { reason: Some("blurry".into()) }, "admin", now)
            .unwrap();
        let second = board.submit("alice", &task.id, "c".into(), None, now).unwrap();
        board
            .review(&second.id, ReviewDecision::Approve, "admin", now)
            .unwrap();

        assert!(matches!(
            board.submit("alice", &task.id, "d".into(), None, now),
            Err(EconomyError::AlreadySubmitted(_))
        ));
    }

    #[test]
    fn test_paused_or_expired_task_is_inactive() {
        let (board, _, now) = setup();
        let mut expired_task = new_task(VerificationType::Manual, None);
        expired_task.ends_at = Some(now - chrono::Duration::hours(1));
        expired_task.starts_at = Some(now - chrono::Duration::hours(2));
        let expired = board.create_task("admin", expired_task, now).unwrap();
        assert!(matches!(
            board.submit("alice", &expired.id, "x".into(), None, now),
            Err(EconomyError::TaskInactive(_))
        ));

        let task = board
            .create_task("admin", new_task(VerificationType::Manual, None), now)
            .unwrap();
        board
            .set_task_status("admin", &task.id, TaskStatus::Paused, now)
            .unwrap();
        assert!(matches!(
            board.submit("alice", &task.id, "x".into(), None, now),
            Err(EconomyError::TaskInactive(_))
        ));
        assert!(matches!(
            board.submit("alice", "missing", "x".into(), None, now),
            Err(EconomyError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_auto_check_outcomes() {
        let (board, ledger, now) = setup();
        let task = board
            .create_task("admin", new_task(VerificationType::Auto, None), now)
            .unwrap();

        let passed = board
            .submit("alice", &task.id, "@alice".into(), Some(CheckOutcome::Passed), now)
            .unwrap();
        assert_eq!(passed.status, SubmissionStatus::Verified);
        assert_eq!(passed.reviewed_by, None);
        assert_eq!(ledger.balance("alice").unwrap(), 300);

        let unavailable = board
            .submit("alice", &task.id, "@alice".into(), Some(CheckOutcome::Unavailable), now)
            .unwrap();
        assert_eq!(unavailable.status, SubmissionStatus::Pending);
        assert_eq!(ledger.balance("alice").unwrap(), 300);
    }

    #[test]
    fn test_approve_uses_current_reward() {
        let (board, ledger, now) = setup();
        let task = board
            .create_task("admin", new_task(VerificationType::Manual, None), now)
            .unwrap();
        let sub = board.submit("alice", &task.id, "p".into(), None, now).unwrap();

        board.tasks.get_mut(&task.id).unwrap().points_reward = 450;
        let done = board
            .review(&sub.id, ReviewDecision::Approve, "admin", now)
            .unwrap();
        assert_eq!(done.points_awarded, Some(450));
        assert_eq!(ledger.balance("alice").unwrap(), 450);
    }

    #[tokio::test]
    async fn test_unavailable_check() {
        let (board, _, now) = setup();
        let task = board
            .create_task("admin", new_task(VerificationType::Auto, None), now)
            .unwrap();
        let outcome = UnavailableCheck.check("alice", &task, "proof").await;
        assert_eq!(outcome, CheckOutcome::Unavailable);
    }
}
