//! Slack delivery for call summaries.
//!
//! - **Block Kit** (`blocks`) - typed message builders and the summary layout
//! - **Notifier** (`notifier`) - `SummarySink` that posts through `chat.postMessage`
//!
//! The bot only needs the `chat:write` scope and membership in the target
//! channel. Set `CALLBRIEF_SLACK_ENABLED=true`, `CALLBRIEF_SLACK_BOT_TOKEN`
//! and `CALLBRIEF_SLACK_CHANNEL_ID` to turn it on.

pub mod blocks;
pub mod notifier;

pub use notifier::SlackNotifier;
