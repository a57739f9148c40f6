//! Entity-tagged file and image associations
//!
//! Files and images are attached to an owner through `(entity_id, entity_type)`
//! pairs. Everything here takes a plain connection so it can run inside a
//! caller's unit of work.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::models::{EntityType, FileDescriptor, FileInput, FileMetadata, Image, ImageInput};

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<(FileDescriptor, String)> {
    Ok((
        FileDescriptor {
            id: row.get(0)?,
            name: row.get(1)?,
            url: Some(row.get(2)?),
            size_kb: row.get(3)?,
            metadata: FileMetadata::default(),
        },
        row.get(4)?,
    ))
}

pub fn list_files_by_entity(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
) -> Result<Vec<FileDescriptor>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, url, size_kb, metadata FROM files
         WHERE entity_id = ?1 AND entity_type = ?2
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![entity_id, entity_type], file_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(mut file, raw_metadata)| -> Result<FileDescriptor> {
            file.metadata = serde_json::from_str(&raw_metadata)?;
            Ok(file)
        })
        .collect()
}

pub fn attach_files(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
    files: &[FileInput],
) -> Result<()> {
    let now = Utc::now();
    let mut stmt = conn.prepare(
        "INSERT INTO files (entity_id, entity_type, name, url, size_kb, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for file in files {
        stmt.execute(params![
            entity_id,
            entity_type,
            file.name,
            file.url,
            file.size_kb,
            serde_json::to_string(&file.metadata)?,
            now,
        ])?;
    }
    Ok(())
}

/// Make the entity's file set match `files`: drop files whose id is absent,
/// update files that carry an id, insert the rest.
pub fn sync_files(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
    files: &[FileInput],
) -> Result<()> {
    let keep: HashSet<i64> = files.iter().filter_map(|f| f.id).collect();
    let existing = list_files_by_entity(conn, entity_id, entity_type)?;

    for file in existing.iter().filter(|f| !keep.contains(&f.id)) {
        conn.execute("DELETE FROM files WHERE id = ?1", params![file.id])?;
    }

    let existing_ids: HashSet<i64> = existing.iter().map(|f| f.id).collect();
    let mut new_files = Vec::new();
    for file in files {
        match file.id {
            Some(id) if existing_ids.contains(&id) => {
                conn.execute(
                    "UPDATE files SET name = ?1, url = ?2, size_kb = ?3, metadata = ?4
                     WHERE id = ?5",
                    params![
                        file.name,
                        file.url,
                        file.size_kb,
                        serde_json::to_string(&file.metadata)?,
                        id
                    ],
                )?;
            }
            _ => new_files.push(file.clone()),
        }
    }

    attach_files(conn, entity_id, entity_type, &new_files)
}

pub fn delete_files_by_entity(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM files WHERE entity_id = ?1 AND entity_type = ?2",
        params![entity_id, entity_type],
    )?)
}

pub fn attach_images(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
    user_id: Option<i64>,
    images: &[ImageInput],
) -> Result<Vec<i64>> {
    let now = Utc::now();
    let mut ids = Vec::with_capacity(images.len());
    for image in images {
        conn.execute(
            "INSERT INTO images (url, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![image.url, user_id, now],
        )?;
        let image_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO image_connections (image_id, entity_id, entity_type) VALUES (?1, ?2, ?3)",
            params![image_id, entity_id, entity_type],
        )?;
        ids.push(image_id);
    }
    Ok(ids)
}

pub fn list_images_by_entity(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
) -> Result<Vec<Image>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.url, i.user_id, i.created_at
         FROM images i
         JOIN image_connections c ON c.image_id = i.id
         WHERE c.entity_id = ?1 AND c.entity_type = ?2
         ORDER BY i.id",
    )?;
    let images = stmt
        .query_map(params![entity_id, entity_type], |row| {
            Ok(Image {
                id: row.get(0)?,
                url: row.get(1)?,
                user_id: row.get(2)?,
                created_at: row.get::<_, DateTime<Utc>>(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Remove the entity's image links and the images they pointed at
pub fn delete_images_by_entity(
    conn: &Connection,
    entity_id: i64,
    entity_type: EntityType,
) -> Result<usize> {
    let image_ids: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT image_id FROM image_connections WHERE entity_id = ?1 AND entity_type = ?2",
        )?;
        let ids = stmt
            .query_map(params![entity_id, entity_type], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };

    conn.execute(
        "DELETE FROM image_connections WHERE entity_id = ?1 AND entity_type = ?2",
        params![entity_id, entity_type],
    )?;
    for image_id in &image_ids {
        conn.execute("DELETE FROM images WHERE id = ?1", params![image_id])?;
    }

    debug!(
        "Deleted {} images for {} {}",
        image_ids.len(),
        entity_type.as_str(),
        entity_id
    );
    Ok(image_ids.len())
}

impl Database {
    pub fn list_files_by_entity(
        &self,
        entity_id: i64,
        entity_type: EntityType,
    ) -> Result<Vec<FileDescriptor>> {
        self.with_conn(|conn| list_files_by_entity(conn, entity_id, entity_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write;

    fn file(id: Option<i64>, name: &str) -> FileInput {
        FileInput {
            id,
            name: name.to_string(),
            url: format!("https://files.example.com/{}", name),
            size_kb: 12.5,
            metadata: FileMetadata {
                unlock_amount: Some(100),
                currency: None,
                benefactors_only: false,
            },
        }
    }

    #[test]
    fn test_attach_and_list_files() {
        let db = Database::scratch().unwrap();
        write(&db, |conn| attach_files(conn, 1, EntityType::BountyEntry, &[file(None, "a")]))
            .unwrap();

        let files = db.list_files_by_entity(1, EntityType::BountyEntry).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].metadata.unlock_amount, Some(100));
        assert!(db
            .list_files_by_entity(1, EntityType::Bounty)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_sync_files_replaces_set() {
        let db = Database::scratch().unwrap();
        write(&db, |conn| {
            attach_files(
                conn,
                1,
                EntityType::BountyEntry,
                &[file(None, "keep"), file(None, "drop")],
            )
        })
        .unwrap();
        let before = db.list_files_by_entity(1, EntityType::BountyEntry).unwrap();
        let keep_id = before.iter().find(|f| f.name == "keep").unwrap().id;

        let mut renamed = file(Some(keep_id), "kept");
        renamed.metadata.benefactors_only = true;
        write(&db, |conn| {
            sync_files(
                conn,
                1,
                EntityType::BountyEntry,
                &[renamed, file(None, "new")],
            )
        })
        .unwrap();

        let after = db.list_files_by_entity(1, EntityType::BountyEntry).unwrap();
        let names: Vec<&str> = after.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["kept", "new"]);
        assert_eq!(after[0].id, keep_id);
        assert!(after[0].metadata.benefactors_only);
    }

    #[test]
    fn test_delete_images_removes_links_and_images() {
        let db = Database::scratch().unwrap();
        let images = vec![
            ImageInput {
                url: "https://img.example.com/1.png".to_string(),
            },
            ImageInput {
                url: "https://img.example.com/2.png".to_string(),
            },
        ];
        write(&db, |conn| attach_images(conn, 4, EntityType::BountyEntry, Some(9), &images))
            .unwrap();

        let removed =
            write(&db, |conn| delete_images_by_entity(conn, 4, EntityType::BountyEntry)).unwrap();
        assert_eq!(removed, 2);

        let remaining: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
