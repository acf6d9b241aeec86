//! The playbook: learned strategy bullets persisted with a session.
//!
//! A playbook is only ever changed through tags and [`DeltaBatch`]es.
//! A batch is applied all-or-nothing: every operation is validated against a
//! working copy first, and the playbook is replaced only if all of them
//! succeed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlaybookError;

/// One learned strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub id: String,
    pub section: String,
    pub content: String,
    #[serde(default)]
    pub helpful_count: u32,
    #[serde(default)]
    pub harmful_count: u32,
    #[serde(default)]
    pub neutral_count: u32,
    /// Votes received, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<BulletTag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bullet {
    /// helpful minus harmful.
    pub fn score(&self) -> i64 {
        i64::from(self.helpful_count) - i64::from(self.harmful_count)
    }

    fn apply_tag(&mut self, tag: BulletTag) {
        match tag {
            BulletTag::Helpful => self.helpful_count += 1,
            BulletTag::Harmful => self.harmful_count += 1,
            BulletTag::Neutral => self.neutral_count += 1,
        }
        self.tags.push(tag);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletTag {
    Helpful,
    Harmful,
    Neutral,
}

impl FromStr for BulletTag {
    type Err = PlaybookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helpful" => Ok(Self::Helpful),
            "harmful" => Ok(Self::Harmful),
            "neutral" => Ok(Self::Neutral),
            other => Err(PlaybookError::UnknownTag(other.to_string())),
        }
    }
}

/// A typed playbook mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeltaOperation {
    #[serde(alias = "ADD", alias = "Add")]
    Add { section: String, content: String },

    #[serde(alias = "EDIT", alias = "Edit")]
    Edit { bullet_id: String, content: String },

    #[serde(alias = "TAG", alias = "Tag")]
    Tag { bullet_id: String, tag: BulletTag },

    #[serde(alias = "REMOVE", alias = "Remove")]
    Remove { bullet_id: String },
}

/// An atomic set of operations, with the curator's reasoning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaBatch {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub operations: Vec<DeltaOperation>,
}

impl DeltaBatch {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Aggregate counts for logging and prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookStats {
    pub sections: usize,
    pub bullets: usize,
    pub helpful: u32,
    pub harmful: u32,
    pub neutral: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    #[serde(default)]
    bullets: BTreeMap<String, Bullet>,
    #[serde(default)]
    next_id: u64,
}

impl Playbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Bullet> {
        self.bullets.get(id)
    }

    pub fn bullets(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.values()
    }

    /// Section names in sorted order.
    pub fn sections(&self) -> Vec<&str> {
        let mut sections: Vec<&str> = self.bullets.values().map(|b| b.section.as_str()).collect();
        sections.sort_unstable();
        sections.dedup();
        sections
    }

    /// Add a bullet and return its id.
    pub fn add_bullet(&mut self, section: &str, content: &str) -> Result<String, PlaybookError> {
        let section = section.trim();
        let content = content.trim();
        if section.is_empty() {
            return Err(PlaybookError::InvalidOperation("add: empty section".into()));
        }
        if content.is_empty() {
            return Err(PlaybookError::InvalidOperation("add: empty content".into()));
        }
        self.next_id += 1;
        let id = format!("{}-{:05}", section_prefix(section), self.next_id);
        let now = Utc::now();
        self.bullets.insert(
            id.clone(),
            Bullet {
                id: id.clone(),
                section: section.to_string(),
                content: content.to_string(),
                helpful_count: 0,
                harmful_count: 0,
                neutral_count: 0,
                tags: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    /// Record a helpful/harmful/neutral vote on one bullet.
    pub fn tag_bullet(&mut self, id: &str, tag: BulletTag) -> Result<(), PlaybookError> {
        let bullet = self
            .bullets
            .get_mut(id)
            .ok_or_else(|| PlaybookError::UnknownBullet(id.to_string()))?;
        bullet.apply_tag(tag);
        Ok(())
    }

    fn apply_operation(&mut self, op: &DeltaOperation) -> Result<(), PlaybookError> {
        match op {
            DeltaOperation::Add { section, content } => self.add_bullet(section, content).map(|_| ()),
            DeltaOperation::Edit { bullet_id, content } => {
                if content.trim().is_empty() {
                    return Err(PlaybookError::InvalidOperation(format!("edit {bullet_id}: empty content")));
                }
                let bullet = self
                    .bullets
                    .get_mut(bullet_id)
                    .ok_or_else(|| PlaybookError::UnknownBullet(bullet_id.clone()))?;
                bullet.content = content.trim().to_string();
                bullet.updated_at = Utc::now();
                Ok(())
            }
            DeltaOperation::Tag { bullet_id, tag } => self.tag_bullet(bullet_id, *tag),
            DeltaOperation::Remove { bullet_id } => self
                .bullets
                .remove(bullet_id)
                .map(|_| ())
                .ok_or_else(|| PlaybookError::UnknownBullet(bullet_id.clone())),
        }
    }

    /// Apply every operation in `batch`, or none of them.
    pub fn apply_delta(&mut self, batch: &DeltaBatch) -> Result<(), PlaybookError> {
        let mut working = self.clone();
        for op in &batch.operations {
            working.apply_operation(op)?;
        }
        *self = working;
        Ok(())
    }

    pub fn stats(&self) -> PlaybookStats {
        self.bullets.values().fold(
            PlaybookStats {
                sections: self.sections().len(),
                ..PlaybookStats::default()
            },
            |mut acc, b| {
                acc.bullets += 1;
                acc.helpful += b.helpful_count;
                acc.harmful += b.harmful_count;
                acc.neutral += b.neutral_count;
                acc
            },
        )
    }

    /// Full listing with ids and counters, for reflector/curator prompts.
    pub fn as_prompt(&self) -> String {
        if self.bullets.is_empty() {
            return "(empty playbook)".to_string();
        }
        let mut out = String::new();
        for section in self.sections() {
            let _ = writeln!(out, "## {section}");
            for b in self.bullets.values().filter(|b| b.section == section) {
                let _ = writeln!(
                    out,
                    "[{}] helpful={} harmful={} neutral={} :: {}",
                    b.id, b.helpful_count, b.harmful_count, b.neutral_count, b.content
                );
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// The best `max` strategies as a system-prompt block; empty when none
    /// qualify. Bullets voted more harmful than helpful are left out.
    pub fn as_context(&self, max: usize) -> String {
        let mut ranked: Vec<&Bullet> = self.bullets.values().filter(|b| b.score() >= 0).collect();
        ranked.sort_by(|a, b| {
            b.score()
                .cmp(&a.score())
                .then(b.helpful_count.cmp(&a.helpful_count))
                .then(a.id.cmp(&b.id))
        });
        if ranked.is_empty() || max == 0 {
            return String::new();
        }
        let mut out = String::from("## Learned Strategies\n");
        for b in ranked.into_iter().take(max) {
            let _ = writeln!(out, "- [{}] {}", b.section, b.content);
        }
        out
    }
}

fn section_prefix(section: &str) -> String {
    let prefix: String = section
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|part| !part.is_empty())
        .unwrap_or("gen")
        .to_ascii_lowercase()
        .chars()
        .take(8)
        .collect();
    if prefix.is_empty() { "gen".to_string() } else { prefix }
}
