//! Catalog engine: course and module persistence and validation.

use rusqlite::{params, Connection, Row};

use crate::error::{Result, TrainError};
use crate::ids::{CourseId, ModuleId};
use crate::storage::{optional, Database};
use crate::time::{to_rfc3339, Clock};

use super::types::*;

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

/// Create a course. Slugs are unique; a duplicate is a `Conflict`.
pub fn create_course(db: &Database, clock: &dyn Clock, slug: &str, title: &str) -> Result<Course> {
    let slug = slug.trim();
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(TrainError::InvalidInput(format!("invalid course slug '{slug}'")));
    }
    if title.trim().is_empty() {
        return Err(TrainError::InvalidInput("course title is required".into()));
    }

    let course = Course {
        id: CourseId::generate(),
        slug: slug.to_string(),
        title: title.trim().to_string(),
        created_at: to_rfc3339(clock.now()),
    };
    db.with_conn(|c| {
        c.execute(
            "INSERT INTO courses (id, slug, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![course.id.0, course.slug, course.title, course.created_at],
        )?;
        Ok(())
    })?;
    log::info!("created course {} ({})", course.slug, course.id);
    Ok(course)
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: CourseId(row.get(0)?),
        slug: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Look up a course by slug.
pub fn course_by_slug(conn: &Connection, slug: &str) -> Result<Course> {
    optional(conn.query_row(
        "SELECT id, slug, title, created_at FROM courses WHERE slug = ?1",
        [slug],
        course_from_row,
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("course '{slug}'")))
}

/// Look up a course by id.
pub fn course_by_id(conn: &Connection, id: &CourseId) -> Result<Course> {
    optional(conn.query_row(
        "SELECT id, slug, title, created_at FROM courses WHERE id = ?1",
        [&id.0],
        course_from_row,
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("course {id}")))
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// Append a module to a course.
pub fn add_module(db: &Database, course_slug: &str, new: NewModule) -> Result<Module> {
    if new.order == 0 {
        return Err(TrainError::InvalidInput("module order starts at 1".into()));
    }
    if let Some(key) = &new.module_key {
        if key.is_empty() || key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TrainError::InvalidInput(format!(
                "module key '{key}' must not be empty or numeric"
            )));
        }
    }
    db.with_conn(|c| {
        let course = course_by_slug(c, course_slug)?;
        let module = Module {
            id: ModuleId::generate(),
            course_id: course.id,
            order: new.order,
            module_key: new.module_key,
            title: new.title,
            content_ref: new.content_ref,
            demo: new.demo,
        };
        c.execute(
            "INSERT INTO modules (id, course_id, ord, module_key, title, content_ref, demo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                module.id.0,
                module.course_id.0,
                module.order,
                module.module_key,
                module.title,
                module.content_ref,
                module.demo
            ],
        )?;
        Ok(module)
    })
}

/// All modules of a course in ascending order, validated as contiguous.
pub fn course_modules(conn: &Connection, course_id: &CourseId) -> Result<Vec<Module>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, ord, module_key, title, content_ref, demo
         FROM modules WHERE course_id = ?1 ORDER BY ord",
    )?;
    let modules = stmt
        .query_map([&course_id.0], |row| {
            Ok(Module {
                id: ModuleId(row.get(0)?),
                course_id: CourseId(row.get(1)?),
                order: row.get(2)?,
                module_key: row.get(3)?,
                title: row.get(4)?,
                content_ref: row.get(5)?,
                demo: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    validate_module_orders(&modules)?;
    Ok(modules)
}

/// Check that module orders are exactly `1..=N` when sorted.
pub fn validate_module_orders(modules: &[Module]) -> Result<()> {
    let mut orders: Vec<u32> = modules.iter().map(|m| m.order).collect();
    orders.sort_unstable();
    for (i, order) in orders.iter().enumerate() {
        let expected = i as u32 + 1;
        if *order != expected {
            return Err(TrainError::DataIntegrity(format!(
                "module orders must be contiguous from 1: expected {expected}, found {order}"
            )));
        }
    }
    Ok(())
}

/// Resolve a module of a course by key, id or order number.
pub fn module_by_key(conn: &Connection, course_id: &CourseId, key: &str) -> Result<Module> {
    let modules = course_modules(conn, course_id)?;
    find_module(&modules, key)
        .cloned()
        .ok_or_else(|| TrainError::NotFound(format!("module '{key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SystemClock;

    fn module(order: u32) -> Module {
        Module {
            id: ModuleId::generate(),
            course_id: CourseId::from("crs_x"),
            order,
            module_key: None,
            title: format!("Module {order}"),
            content_ref: format!("content/{order}"),
            demo: true,
        }
    }

    fn seeded() -> (Database, Course) {
        let db = Database::open_in_memory().unwrap();
        let course = create_course(&db, &SystemClock, "forklift", "Forklift Operator").unwrap();
        for order in 1..=3 {
            add_module(
                &db,
                "forklift",
                NewModule {
                    order,
                    module_key: Some(format!("m{order}")),
                    title: format!("Module {order}"),
                    content_ref: format!("content/m{order}"),
                    demo: true,
                },
            )
            .unwrap();
        }
        (db, course)
    }

    #[test]
    fn test_contiguous_orders_accepted() {
        let mods = vec![module(2), module(1), module(3)];
        assert!(validate_module_orders(&mods).is_ok());
        assert!(validate_module_orders(&[]).is_ok());
    }

    #[test]
    fn test_gap_rejected() {
        let mods = vec![module(1), module(3)];
        assert!(matches!(
            validate_module_orders(&mods),
            Err(TrainError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_not_starting_at_one_rejected() {
        let mods = vec![module(2), module(3)];
        assert!(validate_module_orders(&mods).is_err());
    }

    #[test]
    fn test_course_modules_sorted() {
        let (db, course) = seeded();
        let mods = db.with_conn(|c| course_modules(c, &course.id)).unwrap();
        let orders: Vec<u32> = mods.iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_order_conflicts() {
        let (db, _) = seeded();
        let dup = add_module(
            &db,
            "forklift",
            NewModule {
                order: 2,
                module_key: None,
                title: "dup".into(),
                content_ref: "x".into(),
                demo: false,
            },
        );
        assert!(matches!(dup, Err(TrainError::Conflict(_))));
    }

    #[test]
    fn test_gap_in_store_surfaces_as_data_integrity() {
        let (db, course) = seeded();
        add_module(
            &db,
            "forklift",
            NewModule {
                order: 5,
                module_key: None,
                title: "late".into(),
                content_ref: "x".into(),
                demo: false,
            },
        )
        .unwrap();
        assert!(matches!(
            db.with_conn(|c| course_modules(c, &course.id)),
            Err(TrainError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_module_by_key_id_or_order() {
        let (db, course) = seeded();
        let by_key = db.with_conn(|c| module_by_key(c, &course.id, "m2")).unwrap();
        assert_eq!(by_key.order, 2);
        let by_order = db.with_conn(|c| module_by_key(c, &course.id, "3")).unwrap();
        assert_eq!(by_order.module_key.as_deref(), Some("m3"));
        let by_id = db
            .with_conn(|c| module_by_key(c, &course.id, &by_key.id.0))
            .unwrap();
        assert_eq!(by_id.id, by_key.id);
        assert!(matches!(
            db.with_conn(|c| module_by_key(c, &course.id, "nope")),
            Err(TrainError::NotFound(_))
        ));
    }

    #[test]
    fn test_exact_key_wins_over_order_number() {
        let mut first = module(1);
        first.module_key = Some("2".into());
        let second = module(2);
        let mods = vec![first.clone(), second.clone()];
        assert_eq!(find_module(&mods, "2").map(|m| &m.id), Some(&first.id));
        assert_eq!(find_module(&mods, "1").map(|m| &m.id), Some(&first.id));

        let reversed = vec![second, first.clone()];
        assert_eq!(find_module(&reversed, "2").map(|m| &m.id), Some(&first.id));
    }

    #[test]
    fn test_numeric_module_key_rejected() {
        let (db, _) = seeded();
        for key in ["4", ""] {
            let res = add_module(
                &db,
                "forklift",
                NewModule::new(4, "Module 4", "content/m4").with_key(key),
            );
            assert!(matches!(res, Err(TrainError::InvalidInput(_))), "key {key:?}");
        }
        assert!(add_module(
            &db,
            "forklift",
            NewModule::new(4, "Module 4", "content/m4").with_key("4b"),
        )
        .is_ok());
    }

    #[test]
    fn test_duplicate_slug_and_bad_slug() {
        let (db, _) = seeded();
        assert!(matches!(
            create_course(&db, &SystemClock, "forklift", "Again"),
            Err(TrainError::Conflict(_))
        ));
        assert!(matches!(
            create_course(&db, &SystemClock, "bad slug", "x"),
            Err(TrainError::InvalidInput(_))
        ));
    }
}
