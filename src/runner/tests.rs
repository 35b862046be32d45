use crate::{
    change::{Change, Unsatisfied},
    migrations::{registry, Migration},
    repo::{memory::MemoryRepo, RepoError, SchemaRepo},
    schema::{ColumnDef, ColumnType, Position, Value},
};

use super::{baseline, dry_run, migrate, status, verify, RunnerError, State};

fn users() -> MemoryRepo {
    let mut repo = MemoryRepo::new();
    repo.create_table(
        "users",
        vec![
            ColumnDef::new("id", ColumnType::Int).not_null().describe(),
            ColumnDef::new("nombre", ColumnType::Varchar(100)).describe(),
        ],
    );
    repo.insert("users", &[("id", Value::Int(1)), ("nombre", "Ana".into())])
        .unwrap();
    repo
}

fn with_second() -> Vec<Migration> {
    let mut migrations = registry().unwrap();
    migrations.push(Migration {
        version: 2,
        name: "add_area",
        description: "Adds the area a user reports to",
        changes: vec![Change::add_column(
            "users",
            ColumnDef::new("area", ColumnType::Varchar(60)),
            Position::Last,
        )],
    });
    migrations
}

#[tokio::test]
async fn migrate_fresh_database() {
    let mut repo = users();
    let migrations = registry().unwrap();

    let applied = migrate(&mut repo, &migrations, None).await.unwrap();

    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].version, 1);
    assert_eq!(applied[0].checksum, migrations[0].checksum());
    assert_eq!(
        repo.rows("users"),
        vec![vec![Value::Int(1), "Ana".into(), Value::Null]]
    );
}

#[tokio::test]
async fn second_migrate_is_noop() {
    let mut repo = users();
    let migrations = registry().unwrap();

    migrate(&mut repo, &migrations, None).await.unwrap();
    let applied = migrate(&mut repo, &migrations, None).await.unwrap();

    assert!(applied.is_empty());
    assert_eq!(repo.describe("users").await.unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_applied_version_aborts() {
    let mut repo = users();
    let migrations = registry().unwrap();

    let mut newer = migrations[0].clone();
    newer.version = 99;
    repo.record(&newer).await.unwrap();

    let res = migrate(&mut repo, &migrations, None).await;

    assert!(matches!(res, Err(RunnerError::UnknownApplied(99))));
    assert_eq!(repo.describe("users").await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_column_without_ledger_entry() {
    let migrations = registry().unwrap();

    // the operator already ran the SQL script by hand, so the ledger is empty
    let mut snapshot = users().snapshot(&["users"]).await.unwrap();
    snapshot
        .tables
        .get_mut("users")
        .unwrap()
        .push(ColumnDef::new("nombre_mostrar", ColumnType::Varchar(120)).describe());
    let mut repo = MemoryRepo::from_snapshot(snapshot);

    let res = migrate(&mut repo, &migrations, None).await;

    assert!(matches!(
        res,
        Err(RunnerError::Apply {
            version: 1,
            source: RepoError::DuplicateColumn { .. }
        })
    ));
    assert!(repo.applied().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_table_records_nothing() {
    let mut repo = MemoryRepo::new();
    let migrations = registry().unwrap();

    let res = migrate(&mut repo, &migrations, None).await;

    assert!(matches!(
        res,
        Err(RunnerError::Apply {
            source: RepoError::NoSuchTable { .. },
            ..
        })
    ));
    assert!(repo.applied().await.unwrap().is_empty());
}

#[tokio::test]
async fn checksum_divergence_aborts() {
    let mut repo = users();
    let mut migrations = registry().unwrap();
    migrate(&mut repo, &migrations, None).await.unwrap();

    migrations[0].changes = vec![Change::add_column(
        "users",
        ColumnDef::new("nombre_mostrar", ColumnType::Varchar(200)),
        Position::After(String::from("nombre")),
    )];

    let res = migrate(&mut repo, &migrations, None).await;

    assert!(matches!(
        res,
        Err(RunnerError::ChecksumMismatch { version: 1, .. })
    ));
}

#[tokio::test]
async fn missing_migration_aborts() {
    let mut repo = users();
    let migrations = with_second();

    repo.record(&migrations[1]).await.unwrap();

    let res = migrate(&mut repo, &migrations, None).await;

    assert!(matches!(res, Err(RunnerError::Missing(1))));
    assert_eq!(repo.describe("users").await.unwrap().len(), 2);
}

#[tokio::test]
async fn target_limits_migrations() {
    let mut repo = users();
    let migrations = with_second();

    let applied = migrate(&mut repo, &migrations, Some(1)).await.unwrap();
    assert_eq!(applied.len(), 1);

    let applied = migrate(&mut repo, &migrations, None).await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].version, 2);

    let fields: Vec<_> = repo
        .describe("users")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.field)
        .collect();
    assert_eq!(fields, vec!["id", "nombre", "nombre_mostrar", "area"]);
}

#[tokio::test]
async fn unknown_target() {
    let mut repo = users();
    let migrations = registry().unwrap();

    let res = migrate(&mut repo, &migrations, Some(7)).await;

    assert!(matches!(res, Err(RunnerError::UnknownTarget(7))));
}

#[tokio::test]
async fn status_reports_pending_and_applied() {
    let mut repo = users();
    let migrations = with_second();
    migrate(&mut repo, &migrations, Some(1)).await.unwrap();

    let statuses = status(&mut repo, &migrations).await.unwrap();

    assert!(matches!(
        statuses[0].state,
        State::Applied {
            checksum_matches: true,
            ..
        }
    ));
    assert_eq!(statuses[1].state, State::Pending);
}

#[tokio::test]
async fn dry_run_leaves_repo_untouched() {
    let mut repo = users();
    let migrations = registry().unwrap();

    let planned = dry_run(&mut repo, &migrations, None).await.unwrap();

    assert_eq!(planned.applied.len(), 1);
    assert_eq!(
        planned.tables["users"][2].to_string(),
        "nombre_mostrar varchar(120) YES NULL"
    );
    assert_eq!(repo.describe("users").await.unwrap().len(), 2);
    assert!(repo.applied().await.unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_reports_missing_table() {
    let mut repo = MemoryRepo::new();
    let migrations = registry().unwrap();

    let res = dry_run(&mut repo, &migrations, None).await;

    assert!(matches!(
        res,
        Err(RunnerError::Apply {
            source: RepoError::NoSuchTable { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn baseline_adopts_manual_change() {
    let mut snapshot = users().snapshot(&["users"]).await.unwrap();
    snapshot
        .tables
        .get_mut("users")
        .unwrap()
        .push(ColumnDef::new("nombre_mostrar", ColumnType::Varchar(120)).describe());
    let mut repo = MemoryRepo::from_snapshot(snapshot);
    let migrations = registry().unwrap();

    let recorded = baseline(&mut repo, &migrations, None).await.unwrap();
    assert_eq!(recorded.len(), 1);

    let applied = migrate(&mut repo, &migrations, None).await.unwrap();
    assert!(applied.is_empty());
}

#[tokio::test]
async fn baseline_refuses_absent_column() {
    let mut repo = users();
    let migrations = registry().unwrap();

    let res = baseline(&mut repo, &migrations, None).await;

    assert!(matches!(
        res,
        Err(RunnerError::NotSatisfied {
            version: 1,
            reason: Unsatisfied::MissingColumn { .. }
        })
    ));
    assert!(repo.applied().await.unwrap().is_empty());
}

#[tokio::test]
async fn verify_flags_drift() {
    let mut repo = users();
    let migrations = registry().unwrap();

    repo.record(&migrations[0]).await.unwrap();

    let verifications = verify(&mut repo, &migrations).await.unwrap();

    assert_eq!(verifications.len(), 1);
    assert_eq!(
        verifications[0].problems,
        vec![String::from("column nombre_mostrar does not exist")]
    );
}

#[tokio::test]
async fn verify_clean_after_migrate() {
    let mut repo = users();
    let migrations = registry().unwrap();
    migrate(&mut repo, &migrations, None).await.unwrap();

    let verifications = verify(&mut repo, &migrations).await.unwrap();

    assert!(verifications[0].problems.is_empty());
}

fn capitalised(extra: &[ColumnDef]) -> MemoryRepo {
    let mut columns = vec![
        ColumnDef::new("id", ColumnType::Int).not_null().describe(),
        ColumnDef::new("Nombre", ColumnType::Varchar(100)).describe(),
    ];
    columns.extend(extra.iter().map(ColumnDef::describe));

    let mut repo = MemoryRepo::new();
    repo.create_table("users", columns);
    repo
}

#[tokio::test]
async fn verify_clean_when_column_names_differ_in_case() {
    let mut repo = capitalised(&[]);
    let migrations = registry().unwrap();

    migrate(&mut repo, &migrations, None).await.unwrap();
    let verifications = verify(&mut repo, &migrations).await.unwrap();

    assert!(verifications[0].problems.is_empty());
}

#[tokio::test]
async fn baseline_adopts_column_added_with_other_case() {
    let mut repo = capitalised(&[ColumnDef::new("Nombre_Mostrar", ColumnType::Varchar(120))]);
    let migrations = registry().unwrap();

    let res = migrate(&mut repo.clone(), &migrations, None).await;
    assert!(matches!(
        res,
        Err(RunnerError::Apply {
            source: RepoError::DuplicateColumn { .. },
            ..
        })
    ));

    let recorded = baseline(&mut repo, &migrations, None).await.unwrap();
    assert_eq!(recorded.len(), 1);

    assert!(migrate(&mut repo, &migrations, None).await.unwrap().is_empty());
    assert!(verify(&mut repo, &migrations).await.unwrap()[0]
        .problems
        .is_empty());
}

#[tokio::test]
async fn status_lists_registry_despite_unknown_versions() {
    let mut repo = users();
    let migrations = registry().unwrap();

    for version in [98, 99] {
        let mut unknown = migrations[0].clone();
        unknown.version = version;
        repo.record(&unknown).await.unwrap();
    }

    let statuses = status(&mut repo, &migrations).await.unwrap();

    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, State::Pending);
}
