// Seeds the read-only reference tables. Safe to run repeatedly: every
// insert is keyed on the unique name.

use anyhow::Result;
use sqlx::Row;

use crate::database::Database;

const SUBJECTS: &[&str] = &[
    "Mathematics",
    "Russian language",
    "Literature",
    "Physics",
    "Chemistry",
    "Biology",
    "History",
    "Geography",
    "Computer science",
    "English language",
    "Music",
    "Art",
    "Physical education",
];

const GRADES: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11"];

const TYPES_OF_WORK: &[&str] = &[
    "Lesson plan",
    "Worksheet",
    "Presentation",
    "Test",
    "Homework",
    "Lab work",
    "Exam preparation",
];

// region -> settlements -> institutions
const PLACES: &[(&str, &[(&str, &[&str])])] = &[
    (
        "Moscow region",
        &[
            (
                "Moscow",
                &["School No. 57", "Lyceum No. 1535", "Gymnasium No. 1567"],
            ),
            ("Zelenograd", &["School No. 1353"]),
        ],
    ),
    (
        "Leningrad region",
        &[(
            "Saint Petersburg",
            &["School No. 239", "Gymnasium No. 56"],
        )],
    ),
    (
        "Novosibirsk region",
        &[("Novosibirsk", &["Lyceum No. 130", "School No. 112"])],
    ),
];

pub async fn seed_reference_data(db: &Database) -> Result<()> {
    for name in SUBJECTS {
        sqlx::query("INSERT OR IGNORE INTO subjects (name) VALUES (?)")
            .bind(*name)
            .execute(&db.pool)
            .await?;
    }

    for name in GRADES {
        sqlx::query("INSERT OR IGNORE INTO grades (name) VALUES (?)")
            .bind(*name)
            .execute(&db.pool)
            .await?;
    }

    for name in TYPES_OF_WORK {
        sqlx::query("INSERT OR IGNORE INTO types_of_work (name) VALUES (?)")
            .bind(*name)
            .execute(&db.pool)
            .await?;
    }

    for (region, settlements) in PLACES {
        sqlx::query("INSERT OR IGNORE INTO regions (name) VALUES (?)")
            .bind(*region)
            .execute(&db.pool)
            .await?;
        let region_id: i64 = sqlx::query("SELECT id FROM regions WHERE name = ?")
            .bind(*region)
            .fetch_one(&db.pool)
            .await?
            .get("id");

        for (settlement, institutions) in *settlements {
            sqlx::query("INSERT OR IGNORE INTO settlements (name, region_id) VALUES (?, ?)")
                .bind(*settlement)
                .bind(region_id)
                .execute(&db.pool)
                .await?;
            let settlement_id: i64 = sqlx::query("SELECT id FROM settlements WHERE name = ?")
                .bind(*settlement)
                .fetch_one(&db.pool)
                .await?
                .get("id");

            for institution in *institutions {
                sqlx::query(
                    "INSERT OR IGNORE INTO educational_institutions (name, settlement_id)
                     VALUES (?, ?)",
                )
                .bind(*institution)
                .bind(settlement_id)
                .execute(&db.pool)
                .await?;
            }
        }
    }

    tracing::info!("reference data seeded");
    Ok(())
}
