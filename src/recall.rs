//! Per-card active-recall bookkeeping on a flashcard set.
//!
//! A record is created the first time a card is reviewed and never otherwise.
//! Each review reassigns the knowledge level (clamped to 0..=5) and bumps the
//! review count; there is no decay or scheduling.

use chrono::Utc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{ActiveRecallRecord, FlashcardSet};

pub const MIN_KNOWLEDGE_LEVEL: i32 = 0;
pub const MAX_KNOWLEDGE_LEVEL: i32 = 5;

pub fn record_review(set: &mut FlashcardSet, card_id: &str, knowledge_level: i32) -> Result<ActiveRecallRecord> {
    if !set.cards.contains(card_id) {
        return Err(Error::not_found(format!("Card '{card_id}'")));
    }

    if !set.active_recall_data.contains(card_id) {
        set.active_recall_data.push(ActiveRecallRecord {
            card_id: card_id.to_string(),
            knowledge_level: MIN_KNOWLEDGE_LEVEL,
            last_reviewed: Utc::now(),
            review_count: 0,
        });
    }

    let record = set
        .active_recall_data
        .get_mut(card_id)
        .ok_or_else(|| Error::Internal("recall record vanished after insert".into()))?;
    record.knowledge_level = knowledge_level.clamp(MIN_KNOWLEDGE_LEVEL, MAX_KNOWLEDGE_LEVEL);
    record.last_reviewed = Utc::now();
    record.review_count = record.review_count.saturating_add(1);

    Ok(record.clone())
}

// Irrecoverable: every card goes back to "never reviewed"
pub fn reset(set: &mut FlashcardSet) {
    set.active_recall_data.clear();
}

pub fn mastery_label(knowledge_level: i32) -> &'static str {
    match knowledge_level {
        0 => "New",
        1 => "Learning",
        2 => "Familiar",
        3 => "Comfortable",
        4 => "Proficient",
        5 => "Mastered",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetProgress {
    pub total_cards: usize,
    pub reviewed_cards: usize,
    pub mastered_cards: usize,
    pub total_reviews: u64,
    pub avg_knowledge: f64,
}

impl SetProgress {
    pub fn of(set: &FlashcardSet) -> Self {
        // Only records whose card still exists count
        let records: Vec<&ActiveRecallRecord> = set
            .active_recall_data
            .iter()
            .filter(|r| set.cards.contains(&r.card_id))
            .collect();

        let reviewed_cards = records.len();
        let avg_knowledge = if reviewed_cards == 0 {
            0.0
        } else {
            records.iter().map(|r| r.knowledge_level as f64).sum::<f64>() / reviewed_cards as f64
        };

        Self {
            total_cards: set.cards.len(),
            reviewed_cards,
            mastered_cards: records.iter().filter(|r| r.knowledge_level >= 4).count(),
            total_reviews: records.iter().map(|r| r.review_count as u64).sum(),
            avg_knowledge,
        }
    }

    pub fn completion(&self) -> f64 {
        if self.total_cards == 0 {
            0.0
        } else {
            (self.reviewed_cards as f64 / self.total_cards as f64) * 100.0
        }
    }
}
