#![cfg(feature = "sqlite")]

use sql_gateway::{
    ConnectionMode, DataDefinitionQuery, EmbeddedGateway, GatewayError, Insert,
    ProcedureDataGateway, QueryDataGateway, Select, SqlValue, StoredProcedure, Write,
};

fn file_gateway(dir: &tempfile::TempDir, name: &str) -> EmbeddedGateway {
    let path = dir.path().join(name);
    EmbeddedGateway::new(path.to_string_lossy(), ConnectionMode::Persistent)
}

#[test]
fn delete_reports_affected_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut gw = file_gateway(&dir, "phones.db");

    let created = gw.execute_ddl(&DataDefinitionQuery::new(
        "CREATE TABLE phone_number (id INTEGER PRIMARY KEY, number TEXT)",
    ))?;
    assert_eq!(created, 0);

    for i in 1..=5 {
        let insert = Insert::parse("INSERT INTO phone_number (id, number) VALUES (?1, ?2)")?;
        let id: i64 = gw.insert_with(&insert, |cmd| {
            cmd.bind(i as i64).bind(format!("555-000{i}"));
        })?;
        assert_eq!(id, i as i64);
    }

    let delete = Write::parse("DELETE FROM phone_number WHERE id = 1")?;
    assert_eq!(gw.execute(&delete)?, 1);
    assert_eq!(gw.execute(&delete)?, 0);
    Ok(())
}

#[test]
fn insert_returns_generated_identity() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut gw = file_gateway(&dir, "employees.db");
    gw.execute_ddl(&DataDefinitionQuery::new(
        "CREATE TABLE employee (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, salary INTEGER)",
    ))?;

    let insert = Insert::parse("INSERT INTO employee (name, salary) VALUES (?1, ?2)")?;
    let first: i64 = gw.insert_with(&insert, |cmd| {
        cmd.bind("Ada").bind(70_000_i64);
    })?;
    let second: i32 = gw.insert_with(&insert, |cmd| {
        cmd.bind("Grace").bind(61_000_i64);
    })?;
    assert_eq!(first, 1);
    assert_eq!(second, 2);
    Ok(())
}

#[test]
fn scalar_contract_covers_null_empty_and_first_column() -> Result<(), GatewayError> {
    let mut gw = EmbeddedGateway::new(":memory:", ConnectionMode::Persistent);

    assert_eq!(gw.fetch_scalar::<i64>(&Select::new("SELECT NULL"))?, None);
    assert_eq!(gw.fetch_scalar::<SqlValue>(&Select::new("SELECT NULL"))?, None);
    assert_eq!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT 1, NULL, 'x'"))?,
        Some(1)
    );

    gw.execute_ddl(&DataDefinitionQuery::new("CREATE TABLE t (a INTEGER)"))?;
    assert_eq!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT a FROM t WHERE a = -1"))?,
        None
    );
    Ok(())
}

#[test]
fn setup_callback_runs_exactly_once() -> Result<(), GatewayError> {
    let mut gw = EmbeddedGateway::new(":memory:", ConnectionMode::Persistent);
    let mut setups = 0;
    let value = gw.fetch_scalar_with::<i64, _>(&Select::new("SELECT ?1"), |cmd| {
        setups += 1;
        cmd.bind(5_i64);
    })?;
    assert_eq!(value, Some(5));
    assert_eq!(setups, 1);
    Ok(())
}

#[test]
fn mapper_owns_iteration_and_sees_only_filtered_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut gw = file_gateway(&dir, "salaries.db");
    gw.execute_ddl(&DataDefinitionQuery::new(
        "CREATE TABLE employee (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, salary INTEGER)",
    ))?;
    let insert = Insert::parse("INSERT INTO employee (name, salary) VALUES (?1, ?2)")?;
    for (name, salary) in [("Alice", 60_000_i64), ("Bob", 62_000), ("Carol", 75_000)] {
        gw.insert_with::<i64, _>(&insert, |cmd| {
            cmd.bind(name).bind(salary);
        })?;
    }

    let mut calls = 0;
    let names = gw.fetch_rows_with(
        &Select::new("SELECT name, salary FROM employee WHERE salary >= ?1 ORDER BY salary"),
        |cmd| {
            cmd.bind(62_000_i64);
        },
        |rows: &mut sql_gateway::rusqlite::Rows<'_>| {
            calls += 1;
            let mut names = Vec::new();
            while let Some(row) = rows.next()? {
                let name: String = row.get(0)?;
                let salary: i64 = row.get(1)?;
                assert!(salary >= 62_000);
                names.push(name);
            }
            Ok(names)
        },
    )?;
    assert_eq!(calls, 1);
    assert_eq!(names, vec!["Bob".to_string(), "Carol".to_string()]);
    Ok(())
}

#[test]
fn persistent_gateway_reuses_its_connection() -> Result<(), GatewayError> {
    // In-memory databases live exactly as long as their connection, so a
    // table surviving into the second call proves the handle was reused.
    let mut gw = EmbeddedGateway::new(":memory:", ConnectionMode::Persistent);
    gw.execute_ddl(&DataDefinitionQuery::new("CREATE TABLE t (a INTEGER)"))?;
    assert_eq!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT count(*) FROM t"))?,
        Some(0)
    );
    Ok(())
}

#[test]
fn ephemeral_gateway_opens_a_fresh_connection_per_call() -> Result<(), GatewayError> {
    let mut gw = EmbeddedGateway::new(":memory:", ConnectionMode::Ephemeral);
    gw.execute_ddl(&DataDefinitionQuery::new("CREATE TABLE t (a INTEGER)"))?;
    // The table lived only as long as that call's connection.
    assert!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT count(*) FROM t"))
            .is_err()
    );
    Ok(())
}

#[test]
fn closed_persistent_gateway_reopens_from_its_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut gw = file_gateway(&dir, "reopen.db");
    gw.execute_ddl(&DataDefinitionQuery::new("CREATE TABLE t (a INTEGER)"))?;
    gw.insert::<i64>(&Insert::parse("INSERT INTO t (a) VALUES (9)")?)?;

    gw.close();
    assert_eq!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT a FROM t"))?,
        Some(9)
    );
    Ok(())
}

#[test]
fn adopted_connection_is_used_and_not_reopenable() -> Result<(), Box<dyn std::error::Error>> {
    let conn = sql_gateway::rusqlite::Connection::open_in_memory()?;
    conn.execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (7);")?;

    let mut gw = EmbeddedGateway::from_connection(conn);
    assert_eq!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT a FROM t"))?,
        Some(7)
    );

    gw.close();
    assert!(matches!(
        gw.fetch_scalar::<i64>(&Select::new("SELECT 1")),
        Err(GatewayError::Connection(_))
    ));
    Ok(())
}

#[test]
fn probe_succeeds_and_procedures_are_unsupported() {
    let mut gw = EmbeddedGateway::new(":memory:", ConnectionMode::Persistent);
    assert!(gw.test_connection());

    assert!(matches!(
        gw.call_scalar::<i64>(&StoredProcedure::new("any_proc")),
        Err(GatewayError::Unsupported(_))
    ));
    assert!(matches!(
        gw.call(&StoredProcedure::new("any_proc")),
        Err(GatewayError::Unsupported(_))
    ));
}
