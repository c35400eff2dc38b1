use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::types::{Angle, GeneratedImage, Resolution};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generated_images (
    id          TEXT PRIMARY KEY,
    image_data  TEXT NOT NULL,
    angle       TEXT NOT NULL,
    prompt      TEXT NOT NULL,
    timestamp   INTEGER NOT NULL,
    resolution  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_timestamp ON generated_images(timestamp);
"#;

/// Open (or create) the image database. Pass `None` for an in-memory database.
pub fn open_database(path: Option<&std::path::Path>) -> Result<Connection> {
    let conn = match path {
        Some(p) => Connection::open(p).context("Failed to open image database")?,
        None => Connection::open_in_memory().context("Failed to open in-memory database")?,
    };

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )
    .context("Failed to set PRAGMA options")?;

    conn.execute_batch(SCHEMA)
        .context("Failed to create image schema")?;

    Ok(conn)
}

/// Insert an image, replacing any row with the same id.
pub fn insert_image(conn: &Connection, image: &GeneratedImage) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO generated_images (id, image_data, angle, prompt, timestamp, resolution)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            image.id,
            image.image_data,
            image.angle.label(),
            image.prompt,
            image.timestamp,
            image.resolution.as_str(),
        ],
    )
    .context("Failed to insert image")?;
    Ok(())
}

fn parse_angle(label: &str) -> Result<Angle> {
    serde_json::from_value(serde_json::Value::String(label.to_string()))
        .with_context(|| format!("Unknown angle '{}' in image row", label))
}

fn parse_resolution(tier: &str) -> Result<Resolution> {
    serde_json::from_value(serde_json::Value::String(tier.to_string()))
        .with_context(|| format!("Unknown resolution '{}' in image row", tier))
}

/// All images, newest first.
pub fn list_images(conn: &Connection) -> Result<Vec<GeneratedImage>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, image_data, angle, prompt, timestamp, resolution
             FROM generated_images
             ORDER BY timestamp DESC",
        )
        .context("Failed to prepare list_images query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .context("Failed to execute list_images query")?;

    let mut images = Vec::new();
    for row in rows {
        let (id, image_data, angle, prompt, timestamp, resolution) =
            row.context("Failed to read image row")?;
        images.push(GeneratedImage {
            id,
            image_data,
            angle: parse_angle(&angle)?,
            prompt,
            timestamp,
            resolution: parse_resolution(&resolution)?,
        });
    }
    Ok(images)
}

/// Delete one image. Returns whether a row was removed.
pub fn delete_image(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn
        .execute("DELETE FROM generated_images WHERE id = ?1", params![id])
        .context("Failed to delete image")?;
    Ok(count > 0)
}

/// Delete every image. Returns the number of rows removed.
pub fn clear_images(conn: &Connection) -> Result<u32> {
    let count = conn
        .execute("DELETE FROM generated_images", [])
        .context("Failed to clear images")?;
    Ok(count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        open_database(None).unwrap()
    }

    fn image(id: &str, timestamp: i64) -> GeneratedImage {
        GeneratedImage {
            id: id.to_string(),
            image_data: "data:image/png;base64,AAAA".to_string(),
            angle: Angle::TopDown,
            prompt: "a lamp".to_string(),
            timestamp,
            resolution: Resolution::FourK,
        }
    }

    #[test]
    fn test_open_in_memory() {
        assert!(open_database(None).is_ok());
    }

    #[test]
    fn test_insert_and_list() {
        let conn = setup();
        insert_image(&conn, &image("a", 1)).unwrap();

        let images = list_images(&conn).unwrap();
        assert_eq!(images, vec![image("a", 1)]);
    }

    #[test]
    fn test_list_newest_first() {
        let conn = setup();
        insert_image(&conn, &image("old", 100)).unwrap();
        insert_image(&conn, &image("new", 300)).unwrap();
        insert_image(&conn, &image("mid", 200)).unwrap();

        let ids: Vec<String> = list_images(&conn).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_delete_image() {
        let conn = setup();
        insert_image(&conn, &image("a", 1)).unwrap();
        assert!(delete_image(&conn, "a").unwrap());
        assert!(!delete_image(&conn, "a").unwrap());
        assert!(list_images(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_clear_images() {
        let conn = setup();
        insert_image(&conn, &image("a", 1)).unwrap();
        insert_image(&conn, &image("b", 2)).unwrap();
        assert_eq!(clear_images(&conn).unwrap(), 2);
        assert!(list_images(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_bad_angle_row_is_error() {
        let conn = setup();
        conn.execute(
            "INSERT INTO generated_images VALUES ('x', 'd', 'Sideways', 'p', 1, '1k')",
            [],
        )
        .unwrap();
        assert!(list_images(&conn).is_err());
    }
}
