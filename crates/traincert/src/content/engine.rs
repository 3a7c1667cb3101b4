//! Quiz item lifecycle: create, edit, publish, unpublish, history.

use rusqlite::{params, Connection, Row, TransactionBehavior};

use crate::error::{Result, TrainError};
use crate::ids::ItemId;
use crate::storage::{optional, Database};

use super::types::*;

const ITEM_COLUMNS: &str =
    "id, bank_id, locale, prompt, choices, correct_choice, status, version, updated_by, updated_at";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<(QuizItem, String, String)> {
    // Choices and status are decoded in `decode`.
    Ok((
        QuizItem {
            id: ItemId(row.get(0)?),
            bank_id: row.get(1)?,
            locale: row.get(2)?,
            prompt: row.get(3)?,
            choices: Vec::new(),
            correct_choice: row.get(5)?,
            status: ItemStatus::Draft,
            version: row.get(7)?,
            updated_by: row.get(8)?,
            updated_at: row.get(9)?,
        },
        row.get::<_, String>(4)?,
        row.get::<_, String>(6)?,
    ))
}

fn decode((mut item, choices, status): (QuizItem, String, String)) -> Result<QuizItem> {
    item.choices = serde_json::from_str(&choices)?;
    item.status = ItemStatus::parse(&status)?;
    Ok(item)
}

/// Fetch one item.
pub fn get_item(conn: &Connection, id: &ItemId) -> Result<QuizItem> {
    let raw = optional(conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM quiz_items WHERE id = ?1"),
        [&id.0],
        item_from_row,
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("quiz item {id}")))?;
    decode(raw)
}

/// Published items of a bank in one locale, by id.
pub fn published_items(conn: &Connection, bank_id: &str, locale: &str) -> Result<Vec<QuizItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM quiz_items
         WHERE bank_id = ?1 AND locale = ?2 AND status = 'published' ORDER BY id"
    ))?;
    let raw = stmt
        .query_map(params![bank_id, locale], item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(decode).collect()
}

/// Items with the given ids, in no particular order. Unknown ids are skipped.
pub fn items_by_ids(conn: &Connection, ids: &[ItemId]) -> Result<Vec<QuizItem>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM quiz_items WHERE id IN ({placeholders})"
    ))?;
    let raw = stmt
        .query_map(
            rusqlite::params_from_iter(ids.iter().map(|id| id.0.as_str())),
            item_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(decode).collect()
}

fn validate(item: &QuizItem) -> Result<()> {
    if item.bank_id.trim().is_empty() {
        return Err(TrainError::InvalidInput("bank_id is required".into()));
    }
    if item.prompt.trim().is_empty() {
        return Err(TrainError::InvalidInput("prompt is required".into()));
    }
    if item.choices.len() < 2 {
        return Err(TrainError::InvalidInput(
            "an item needs at least two choices".into(),
        ));
    }
    if item.correct_choice as usize >= item.choices.len() {
        return Err(TrainError::InvalidInput(format!(
            "correct_choice {} is out of range for {} choices",
            item.correct_choice,
            item.choices.len()
        )));
    }
    Ok(())
}

fn append_revision(
    conn: &Connection,
    action: RevisionAction,
    actor: &str,
    before: Option<&QuizItem>,
    after: &QuizItem,
) -> Result<()> {
    let before = before.map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO quiz_item_revisions
            (item_id, version, action, actor, before_state, after_state, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            after.id.0,
            after.version,
            action.as_str(),
            actor,
            before,
            serde_json::to_string(after)?,
            after.updated_at
        ],
    )?;
    Ok(())
}

/// Create a draft item at version 1.
pub fn create_item(db: &Database, actor: &str, draft: ItemDraft, now: &str) -> Result<QuizItem> {
    let item = QuizItem {
        id: ItemId::generate(),
        bank_id: draft.bank_id,
        locale: draft.locale,
        prompt: draft.prompt,
        choices: draft.choices,
        correct_choice: draft.correct_choice,
        status: ItemStatus::Draft,
        version: 1,
        updated_by: actor.to_string(),
        updated_at: now.to_string(),
    };
    validate(&item)?;

    db.with_tx(TransactionBehavior::Immediate, |tx| {
        tx.execute(
            "INSERT INTO quiz_items
                (id, bank_id, locale, prompt, choices, correct_choice, status, version, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id.0,
                item.bank_id,
                item.locale,
                item.prompt,
                serde_json::to_string(&item.choices)?,
                item.correct_choice,
                item.status.as_str(),
                item.version,
                item.updated_by,
                item.updated_at
            ],
        )?;
        append_revision(tx, RevisionAction::Create, actor, None, &item)
    })?;
    log::info!("created quiz item {} in bank {}", item.id, item.bank_id);
    Ok(item)
}

/// Read, transform, CAS-write and log one transition.
fn transition<F>(
    db: &Database,
    id: &ItemId,
    actor: &str,
    expected_version: Option<u32>,
    action: RevisionAction,
    now: &str,
    apply: F,
) -> Result<QuizItem>
where
    F: FnOnce(&mut QuizItem) -> Result<()>,
{
    db.with_tx(TransactionBehavior::Immediate, |tx| {
        let before = get_item(tx, id)?;
        if let Some(expected) = expected_version {
            if expected != before.version {
                return Err(TrainError::Conflict(format!(
                    "item {id} is at version {}, expected {expected}",
                    before.version
                )));
            }
        }

        let mut after = before.clone();
        apply(&mut after)?;
        validate(&after)?;
        after.version = before.version + 1;
        after.updated_by = actor.to_string();
        after.updated_at = now.to_string();

        let updated = tx.execute(
            "UPDATE quiz_items
             SET locale = ?1, prompt = ?2, choices = ?3, correct_choice = ?4, status = ?5,
                 version = ?6, updated_by = ?7, updated_at = ?8
             WHERE id = ?9 AND version = ?10",
            params![
                after.locale,
                after.prompt,
                serde_json::to_string(&after.choices)?,
                after.correct_choice,
                after.status.as_str(),
                after.version,
                after.updated_by,
                after.updated_at,
                id.0,
                before.version
            ],
        )?;
        if updated != 1 {
            return Err(TrainError::Conflict(format!(
                "item {id} changed concurrently"
            )));
        }
        append_revision(tx, action, actor, Some(&before), &after)?;
        log::info!("{} quiz item {id} -> v{}", action.as_str(), after.version);
        Ok(after)
    })
}

/// Apply an edit. Published items stay published.
pub fn edit_item(
    db: &Database,
    id: &ItemId,
    actor: &str,
    edit: ItemEdit,
    expected_version: Option<u32>,
    now: &str,
) -> Result<QuizItem> {
    transition(db, id, actor, expected_version, RevisionAction::Edit, now, |item| {
        if let Some(prompt) = edit.prompt {
            item.prompt = prompt;
        }
        if let Some(choices) = edit.choices {
            item.choices = choices;
        }
        if let Some(correct) = edit.correct_choice {
            item.correct_choice = correct;
        }
        if let Some(locale) = edit.locale {
            item.locale = locale;
        }
        Ok(())
    })
}

/// Publish an item. Re-publishing a published item is still a transition.
pub fn publish_item(
    db: &Database,
    id: &ItemId,
    actor: &str,
    expected_version: Option<u32>,
    now: &str,
) -> Result<QuizItem> {
    transition(db, id, actor, expected_version, RevisionAction::Publish, now, |item| {
        item.status = ItemStatus::Published;
        Ok(())
    })
}

/// Return a published item to draft.
pub fn unpublish_item(
    db: &Database,
    id: &ItemId,
    actor: &str,
    expected_version: Option<u32>,
    now: &str,
) -> Result<QuizItem> {
    transition(db, id, actor, expected_version, RevisionAction::Unpublish, now, |item| {
        if item.status != ItemStatus::Published {
            return Err(TrainError::Conflict(format!("item {} is not published", item.id)));
        }
        item.status = ItemStatus::Draft;
        Ok(())
    })
}

/// Revisions of an item, oldest first.
pub fn item_history(conn: &Connection, id: &ItemId) -> Result<Vec<QuizItemRevision>> {
    let mut stmt = conn.prepare(
        "SELECT seq, item_id, version, action, actor, before_state, after_state, created_at
         FROM quiz_item_revisions WHERE item_id = ?1 ORDER BY seq",
    )?;
    let raw = stmt
        .query_map([&id.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.into_iter()
        .map(|(seq, item_id, version, action, actor, before, after, created_at)| {
            Ok(QuizItemRevision {
                seq,
                item_id: ItemId(item_id),
                version,
                action,
                actor,
                before: before.map(|b| serde_json::from_str(&b)).transpose()?,
                after: serde_json::from_str(&after)?,
                created_at,
            })
        })
        .collect()
}
