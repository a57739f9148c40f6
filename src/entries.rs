//! Bounty entries: submission, listing, gated file access and deletion

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::board::BountyBoard;
use crate::bounties::{get_benefactor, get_bounty};
use crate::error::{BountyError, Result};
use crate::files;
use crate::models::{
    BountyEntry, EntityType, EntryDetails, FileDescriptor, FileInput, FileMetadata, ImageInput,
    Page,
};

const ENTRY_COLUMNS: &str = "id, bounty_id, user_id, description, created_at";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// QUERIES
// ============================================================================

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<BountyEntry> {
    Ok(BountyEntry {
        id: row.get(0)?,
        bounty_id: row.get(1)?,
        user_id: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn get_entry(conn: &Connection, entry_id: i64) -> Result<Option<BountyEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM bounty_entries WHERE id = ?1", ENTRY_COLUMNS),
            params![entry_id],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

/// Sum of every pledge awarded to the entry
pub fn awarded_total(conn: &Connection, entry_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(unit_amount), 0) FROM bounty_benefactors WHERE awarded_to_id = ?1",
        params![entry_id],
        |row| row.get(0),
    )?)
}

pub fn list_entries(
    conn: &Connection,
    bounty_id: i64,
    cursor: Option<i64>,
    limit: u32,
) -> Result<Page<BountyEntry>> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bounty_entries
         WHERE bounty_id = ?1 AND (?2 IS NULL OR id < ?2)
         ORDER BY id DESC
         LIMIT ?3",
        ENTRY_COLUMNS
    ))?;

    // One extra row tells us whether another page exists
    let mut items = stmt
        .query_map(params![bounty_id, cursor, limit + 1], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let next_cursor = if items.len() > limit as usize {
        items.truncate(limit as usize);
        items.last().map(|e| e.id)
    } else {
        None
    };

    Ok(Page { items, next_cursor })
}

/// Whether a non-owner may see the file's URL
fn can_unlock(metadata: &FileMetadata, awarded_total: i64, caller_awarded_entry: bool) -> bool {
    let eligible = !metadata.benefactors_only || caller_awarded_entry;
    eligible && awarded_total >= metadata.unlock_amount.unwrap_or(0)
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertEntryInput {
    /// Present when updating an existing entry
    #[serde(default)]
    pub id: Option<i64>,
    pub bounty_id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<FileInput>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

impl BountyBoard {
    /// Submit a new entry or update one the caller owns
    pub fn upsert_entry(&self, user_id: i64, input: &UpsertEntryInput) -> Result<BountyEntry> {
        let uow = self.db().unit_of_work()?;

        let entry_id = match input.id {
            Some(entry_id) => {
                let existing = get_entry(&uow, entry_id)?.ok_or_else(|| {
                    BountyError::not_found(format!("Entry {} not found", entry_id))
                })?;
                if existing.user_id != Some(user_id) {
                    return Err(BountyError::unauthorized(
                        "Only the entry owner can update it",
                    ));
                }
                if existing.bounty_id != input.bounty_id {
                    return Err(BountyError::invalid_state(
                        "Entry cannot be moved to another bounty",
                    ));
                }

                uow.execute(
                    "UPDATE bounty_entries SET description = ?1 WHERE id = ?2",
                    params![input.description, entry_id],
                )?;
                files::sync_files(&uow, entry_id, EntityType::BountyEntry, &input.files)?;
                entry_id
            }
            None => {
                let bounty = get_bounty(&uow, input.bounty_id)?.ok_or_else(|| {
                    BountyError::not_found(format!("Bounty {} not found", input.bounty_id))
                })?;
                if bounty.complete {
                    return Err(BountyError::invalid_state(
                        "Bounty is complete and no longer accepts entries",
                    ));
                }

                uow.execute(
                    "INSERT INTO bounty_entries (bounty_id, user_id, description, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![input.bounty_id, user_id, input.description, Utc::now()],
                )?;
                let entry_id = uow.last_insert_rowid();
                files::attach_files(&uow, entry_id, EntityType::BountyEntry, &input.files)?;
                entry_id
            }
        };

        files::attach_images(
            &uow,
            entry_id,
            EntityType::BountyEntry,
            Some(user_id),
            &input.images,
        )?;

        let entry = get_entry(&uow, entry_id)?
            .ok_or_else(|| BountyError::Database("entry vanished after write".to_string()))?;
        uow.commit()?;

        info!(
            "{} entry {} on bounty {} for user {}",
            if input.id.is_some() { "Updated" } else { "Created" },
            entry.id,
            entry.bounty_id,
            user_id
        );
        Ok(entry)
    }

    pub fn get_entry(&self, entry_id: i64) -> Result<EntryDetails> {
        self.db().with_conn(|conn| {
            let entry = get_entry(conn, entry_id)?
                .ok_or_else(|| BountyError::not_found(format!("Entry {} not found", entry_id)))?;
            Ok(EntryDetails {
                awarded_total: awarded_total(conn, entry_id)?,
                images: files::list_images_by_entity(conn, entry_id, EntityType::BountyEntry)?,
                entry,
            })
        })
    }

    /// Newest entries first; pass the previous page's `next_cursor` to continue
    pub fn list_entries(
        &self,
        bounty_id: i64,
        cursor: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Page<BountyEntry>> {
        self.db().with_conn(|conn| {
            list_entries(conn, bounty_id, cursor, limit.unwrap_or(DEFAULT_PAGE_SIZE))
        })
    }

    pub fn get_awarded_total(&self, entry_id: i64) -> Result<i64> {
        self.db().with_conn(|conn| awarded_total(conn, entry_id))
    }

    /// Entry files as the caller may see them.
    ///
    /// Owners and moderators get every URL. Anyone else gets a URL only when
    /// the entry's awarded total reaches the file's unlock amount and, for
    /// benefactor-only files, the caller's own pledge went to this entry.
    /// Locked files keep their descriptor with `url` set to `None`.
    pub fn list_files(
        &self,
        entry_id: i64,
        user_id: i64,
        is_moderator: bool,
    ) -> Result<Vec<FileDescriptor>> {
        self.db().with_conn(|conn| {
            let entry = get_entry(conn, entry_id)?
                .ok_or_else(|| BountyError::not_found(format!("Entry {} not found", entry_id)))?;
            let files = files::list_files_by_entity(conn, entry_id, EntityType::BountyEntry)?;

            if is_moderator || entry.user_id == Some(user_id) {
                return Ok(files);
            }

            let total = awarded_total(conn, entry_id)?;
            let caller_awarded = get_benefactor(conn, entry.bounty_id, user_id)?
                .is_some_and(|b| b.awarded_to_id == Some(entry_id));

            debug!(
                "Filtering {} files of entry {} for user {} (awarded total {})",
                files.len(),
                entry_id,
                user_id,
                total
            );

            Ok(files
                .into_iter()
                .map(|mut file| {
                    if !can_unlock(&file.metadata, total, caller_awarded) {
                        file.url = None;
                    }
                    file
                })
                .collect())
        })
    }

    /// Delete an entry that has not been awarded anything, with its files
    /// and images. Returns `None` if the entry does not exist.
    pub fn delete_entry(&self, entry_id: i64) -> Result<Option<BountyEntry>> {
        let uow = self.db().unit_of_work()?;
        let Some(entry) = get_entry(&uow, entry_id)? else {
            return Ok(None);
        };

        let total = awarded_total(&uow, entry_id)?;
        if total != 0 {
            return Err(BountyError::invalid_state(
                "This entry has been awarded and cannot be deleted",
            ));
        }

        let removed_files = files::delete_files_by_entity(&uow, entry_id, EntityType::BountyEntry)?;
        let removed_images =
            files::delete_images_by_entity(&uow, entry_id, EntityType::BountyEntry)?;
        uow.execute(
            "DELETE FROM bounty_entries WHERE id = ?1",
            params![entry_id],
        )?;
        uow.commit()?;

        info!(
            "Deleted entry {} ({} files, {} images)",
            entry_id, removed_files, removed_images
        );
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use crate::testing::{board_with_ledger, seed_bounty, seed_entry, write};

    fn locked_file(name: &str, unlock_amount: i64, benefactors_only: bool) -> FileInput {
        FileInput {
            id: None,
            name: name.to_string(),
            url: format!("https://files.example.com/{}", name),
            size_kb: 1.0,
            metadata: FileMetadata {
                unlock_amount: Some(unlock_amount),
                currency: Some(Currency::Buzz),
                benefactors_only,
            },
        }
    }

    #[test]
    fn test_can_unlock() {
        let open = FileMetadata::default();
        assert!(can_unlock(&open, 0, false));

        let gated = FileMetadata {
            unlock_amount: Some(100),
            currency: None,
            benefactors_only: false,
        };
        assert!(!can_unlock(&gated, 50, false));
        assert!(can_unlock(&gated, 100, false));
        assert!(can_unlock(&gated, 150, false));

        let exclusive = FileMetadata {
            benefactors_only: true,
            ..gated
        };
        assert!(!can_unlock(&exclusive, 100, false));
        assert!(can_unlock(&exclusive, 100, true));
        assert!(!can_unlock(&exclusive, 50, true));
    }

    #[test]
    fn test_upsert_entry_creates_with_files_and_images() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(1, 50)]);

        let entry = board
            .upsert_entry(
                7,
                &UpsertEntryInput {
                    id: None,
                    bounty_id,
                    description: "my entry".to_string(),
                    files: vec![locked_file("model.safetensors", 100, false)],
                    images: vec![ImageInput {
                        url: "https://img.example.com/preview.png".to_string(),
                    }],
                },
            )
            .unwrap();
        assert_eq!(entry.user_id, Some(7));

        let details = board.get_entry(entry.id).unwrap();
        assert_eq!(details.awarded_total, 0);
        assert_eq!(details.images.len(), 1);
        assert_eq!(board.list_files(entry.id, 7, false).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_entry_update_requires_owner() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(1, 50)]);
        let entry_id = seed_entry(&board, bounty_id, 7, vec![]);

        let update = UpsertEntryInput {
            id: Some(entry_id),
            bounty_id,
            description: "changed".to_string(),
            files: vec![],
            images: vec![],
        };
        let err = board.upsert_entry(8, &update).unwrap_err();
        assert!(matches!(err, BountyError::Unauthorized(_)));

        let updated = board.upsert_entry(7, &update).unwrap();
        assert_eq!(updated.description, "changed");
    }

    #[test]
    fn test_upsert_entry_rejects_complete_bounty() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(1, 50)]);
        write(board.db(), |conn| crate::bounties::mark_complete(conn, bounty_id)).unwrap();

        let err = board
            .upsert_entry(
                7,
                &UpsertEntryInput {
                    id: None,
                    bounty_id,
                    description: String::new(),
                    files: vec![],
                    images: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, BountyError::InvalidState(_)));
    }

    #[test]
    fn test_list_entries_paginates_newest_first() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(1, 50)]);
        let ids: Vec<i64> = (0..5)
            .map(|i| seed_entry(&board, bounty_id, 10 + i, vec![]))
            .collect();

        let first = board.list_entries(bounty_id, None, Some(2)).unwrap();
        assert_eq!(
            first.items.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![ids[4], ids[3]]
        );
        assert_eq!(first.next_cursor, Some(ids[3]));

        let second = board
            .list_entries(bounty_id, first.next_cursor, Some(2))
            .unwrap();
        assert_eq!(
            second.items.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );

        let last = board
            .list_entries(bounty_id, second.next_cursor, Some(2))
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.next_cursor, None);
    }

    #[test]
    fn test_owner_and_moderator_see_all_urls() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(1, 50)]);
        let entry_id = seed_entry(
            &board,
            bounty_id,
            7,
            vec![locked_file("a.zip", 1_000, true)],
        );

        assert!(board.list_files(entry_id, 7, false).unwrap()[0].url.is_some());
        assert!(board.list_files(entry_id, 99, true).unwrap()[0].url.is_some());

        let stranger = board.list_files(entry_id, 99, false).unwrap();
        assert_eq!(stranger.len(), 1);
        assert!(stranger[0].url.is_none());
        assert_eq!(stranger[0].name, "a.zip");
    }

    #[test]
    fn test_list_files_missing_entry() {
        let (board, _ledger) = board_with_ledger();
        let err = board.list_files(404, 1, false).unwrap_err();
        assert!(matches!(err, BountyError::NotFound(_)));
    }

    #[test]
    fn test_delete_unawarded_entry_removes_attachments() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(1, 50)]);
        let entry_id = board
            .upsert_entry(
                7,
                &UpsertEntryInput {
                    id: None,
                    bounty_id,
                    description: String::new(),
                    files: vec![locked_file("a.zip", 0, false)],
                    images: vec![ImageInput {
                        url: "https://img.example.com/a.png".to_string(),
                    }],
                },
            )
            .unwrap()
            .id;

        let deleted = board.delete_entry(entry_id).unwrap();
        assert_eq!(deleted.map(|e| e.id), Some(entry_id));

        board
            .db()
            .with_conn(|conn| {
                assert!(get_entry(conn, entry_id)?.is_none());
                let files: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
                let images: i64 =
                    conn.query_row("SELECT COUNT(*) FROM images", [], |r| r.get(0))?;
                let links: i64 =
                    conn.query_row("SELECT COUNT(*) FROM image_connections", [], |r| r.get(0))?;
                assert_eq!((files, images, links), (0, 0, 0));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_delete_missing_entry_returns_none() {
        let (board, _ledger) = board_with_ledger();
        assert!(board.delete_entry(12345).unwrap().is_none());
    }
}
