use callbrief_core::domain::summary::StructuredSummary;
use callbrief_core::DispatchContext;
use serde::Serialize;

const HEADER_LIMIT: usize = 150;
const SECTION_LIMIT: usize = 3000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn link(
        action_id: impl Into<String>,
        label: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), url: Some(url.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Divider { block_id: String },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = TextObject::plain(truncate(&text.into(), HEADER_LIMIT));
        self.blocks.push(Block::Header { block_id: block_id.into(), text });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        let elements = builder.build();
        if !elements.is_empty() {
            self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        }
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(truncate(&text.into(), SECTION_LIMIT)));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(truncate(&text.into(), SECTION_LIMIT)));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(" "))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn summary_message(context: &DispatchContext, summary: &StructuredSummary) -> MessageTemplate {
    let title = context
        .call_title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(context.call_id.as_str());
    let assessment = &summary.overall_assessment;

    MessageBuilder::new(format!("Call summary: {title}"))
        .header("callbrief.summary.header.v1", format!("Call summary: {title}"))
        .section("callbrief.summary.overview.v1", |section| {
            section.mrkdwn(format!("*Summary*\n{}", escape(&summary.summary)));
        })
        .divider("callbrief.summary.divider.v1")
        .section("callbrief.summary.key_points.v1", |section| {
            let lines = summary.key_points.iter().map(|point| {
                format!("• *{}*: {}", escape(&point.topic), escape(&point.detail))
            });
            section.mrkdwn(list_section("Key points", lines));
        })
        .section("callbrief.summary.objections.v1", |section| {
            let lines = summary.objections.iter().map(|objection| {
                let state = if objection.resolved { "resolved" } else { "open" };
                match objection.response.as_deref() {
                    Some(response) => format!(
                        "• {} ({state})\n   Response: {}",
                        escape(&objection.objection),
                        escape(response)
                    ),
                    None => format!("• {} ({state})", escape(&objection.objection)),
                }
            });
            section.mrkdwn(list_section("Objections", lines));
        })
        .section("callbrief.summary.action_items.v1", |section| {
            let lines = summary.action_items.iter().map(|item| match item.due_date.as_deref() {
                Some(due) => format!(
                    "• *{}*: {} (due {})",
                    escape(&item.owner),
                    escape(&item.task),
                    escape(due)
                ),
                None => format!("• *{}*: {}", escape(&item.owner), escape(&item.task)),
            });
            section.mrkdwn(list_section("Action items", lines));
        })
        .context("callbrief.summary.assessment.v1", |context_block| {
            context_block
                .mrkdwn(format!("*Sentiment:* {}", assessment.sentiment.as_str()))
                .mrkdwn(format!("*Deal health:* {}", assessment.deal_health.as_str()))
                .mrkdwn(format!("*Next steps:* {}", escape(&assessment.next_steps)));
        })
        .actions("callbrief.summary.actions.v1", |actions| {
            if let Some(url) = context.call_url.as_deref().filter(|url| !url.trim().is_empty()) {
                actions.button(ButtonElement::link("callbrief.open_call.v1", "Open call", url));
            }
        })
        .context("callbrief.summary.trace.v1", |context_block| {
            context_block
                .plain(format!("Call {} · invocation {}", context.call_id, context.invocation_id));
        })
        .build()
}

fn list_section(heading: &str, lines: impl Iterator<Item = String>) -> String {
    let lines: Vec<String> = lines.collect();
    if lines.is_empty() {
        return format!("*{heading}*\n_None recorded_");
    }
    format!("*{heading}*\n{}", lines.join("\n"))
}

/// Slack treats `&`, `<` and `>` as control characters in message text.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(limit.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}
