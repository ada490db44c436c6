use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::core::memory::types::Schedule;
use crate::core::terminal;

pub const REMINDER_TITLE: &str = "일정 알림 📅";
pub const TEST_TITLE: &str = "테스트 알림 🔔";

/// Delivers reminders at (or right away, for `notify_now`) a given time.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    /// Returns `false` without error when `fire_at` has already passed.
    async fn schedule_at(&self, fire_at: DateTime<Local>, title: &str, body: &str) -> Result<bool>;

    async fn notify_now(&self, title: &str, body: &str) -> Result<()>;
}

/// Reminder text for a schedule `lead_minutes` ahead of it.
pub fn reminder_body(schedule: &Schedule, lead_minutes: i64) -> String {
    let lead = if lead_minutes > 0 && lead_minutes % 60 == 0 {
        format!("{}시간", lead_minutes / 60)
    } else {
        format!("{}분", lead_minutes)
    };
    let location = schedule
        .location
        .as_deref()
        .map(|l| format!(" ({})", l))
        .unwrap_or_default();
    format!(
        "{} 후에 \"{}\"{} 일정이 예정되어있습니다. 잊지 않으셨나요?",
        lead, schedule.title, location
    )
}

/// Instant a reminder for `schedule` should fire.
pub fn reminder_time(schedule: &Schedule, lead_minutes: i64) -> DateTime<Local> {
    schedule.date - ChronoDuration::minutes(lead_minutes)
}

/// One-shot jobs on an in-process scheduler; delivery prints to the terminal.
pub struct CronReminderSink {
    scheduler: JobScheduler,
}

impl CronReminderSink {
    pub async fn start() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        scheduler.start().await?;
        Ok(Self { scheduler })
    }

    fn deliver(title: &str, body: &str) {
        info!("[reminder] delivering '{}'", title);
        terminal::print_reminder(title, body);
    }
}

#[async_trait]
impl ReminderSink for CronReminderSink {
    async fn schedule_at(&self, fire_at: DateTime<Local>, title: &str, body: &str) -> Result<bool> {
        let Ok(delay) = (fire_at - Local::now()).to_std() else {
            debug!("[reminder] '{}' is past due, skipping", title);
            return Ok(false);
        };
        if delay.is_zero() {
            return Ok(false);
        }

        let title_for_job = title.to_string();
        let body_for_job = body.to_string();
        let job = Job::new_one_shot_async(delay, move |_uuid, mut _l| {
            let title = title_for_job.clone();
            let body = body_for_job.clone();
            Box::pin(async move {
                Self::deliver(&title, &body);
            })
        })?;
        self.scheduler.add(job).await?;
        info!("[reminder] '{}' scheduled for {}", title, fire_at.format("%Y-%m-%d %H:%M"));
        Ok(true)
    }

    async fn notify_now(&self, title: &str, body: &str) -> Result<()> {
        Self::deliver(title, body);
        Ok(())
    }
}
