// tests/sql_interface.rs

//! The management functions as SQL callers see them: `SELECT tle.*(...)`
//! through a session, plus the catalog and reserved-schema protections.

mod common;

use common::{count, create_role, open, setup_catalog};
use tlext::db::models::{Extension, Feature};
use tlext::{Error, Value};

#[test]
fn test_install_and_create_through_sql() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    session
        .execute(
            "SELECT tle.install_extension('sqlext', '1.0', 'from sql', \
             $_tle_$CREATE TABLE sqlext_t(a integer); INSERT INTO sqlext_t VALUES (42);$_tle_$)",
        )
        .unwrap();
    session
        .execute("SELECT tle.install_update_path('sqlext', '1.0', '1.1', $$ALTER TABLE sqlext_t ADD COLUMN b text;$$)")
        .unwrap();

    let listed = session.query("SELECT tle.available_extensions()").unwrap();
    assert_eq!(listed.columns, vec!["name", "default_version", "comment"]);
    assert!(listed.rows.iter().any(|row| {
        row[0] == Value::Text("sqlext".into()) && row[2] == Value::Text("from sql".into())
    }));

    let paths = session.query("SELECT tle.extension_update_paths('sqlext')").unwrap();
    assert_eq!(paths.rows.len(), 2);

    session.execute("CREATE EXTENSION sqlext VERSION '1.1'").unwrap();
    assert_eq!(count(&mut session, "SELECT count(*) FROM sqlext_t WHERE b IS NULL"), 1);

    let removed = session.query("SELECT tle.uninstall_if_exists('sqlext')").unwrap();
    assert_eq!(removed.first_value(), Some(&Value::Bool(true)));
    let removed = session.query("SELECT tle.uninstall_if_exists('sqlext')").unwrap();
    assert_eq!(removed.first_value(), Some(&Value::Bool(false)));
}

#[test]
fn test_requires_array_argument() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    session
        .execute("SELECT tle.install_extension('dep', '1.0', 'dep', $$SELECT 1;$$)")
        .unwrap();
    session
        .execute("SELECT tle.install_extension('user_ext', '1.0', 'user', $$SELECT 1;$$, ARRAY['dep']::text[])")
        .unwrap();

    let versions = session.query("SELECT tle.available_extension_versions()").unwrap();
    let requires_col = versions.columns.iter().position(|c| c == "requires").unwrap();
    let row = versions
        .rows
        .iter()
        .find(|row| row[0] == Value::Text("user_ext".into()))
        .unwrap();
    assert_eq!(
        row[requires_col].as_text_array(),
        Some(vec!["dep".to_string(), "tle".to_string()])
    );

    session.execute("CREATE EXTENSION user_ext CASCADE").unwrap();
    let dep = Extension::find_by_name(session.conn(), "dep").unwrap().unwrap();
    let user_ext = Extension::find_by_name(session.conn(), "user_ext").unwrap().unwrap();
    assert!(user_ext.requires.contains(&dep.oid.unwrap()));
}

#[test]
fn test_statement_failure_rolls_back_install() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    let err = session
        .execute(
            "SELECT tle.install_extension('half', '1.0', 'half', $$SELECT 1;$$); \
             SELECT tle.install_extension('half', '1.0', 'again', $$SELECT 2;$$)",
        )
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyInstalled { .. }));

    // the first statement committed on its own
    session.execute("CREATE EXTENSION half").unwrap();
}

#[test]
fn test_catalog_tables_are_protected() {
    let (_temp, config) = setup_catalog(&[]);
    let boot = open(&config, None);
    create_role(&boot, "carol", true, true);
    drop(boot);

    let mut session = open(&config, Some("carol"));
    let err = session.execute("SELECT * FROM tle_extension").unwrap_err();
    assert_eq!(err.to_string(), "permission denied for table tle_extension");
    let err = session.execute("DELETE FROM tle_proc").unwrap_err();
    assert!(matches!(err, Error::PermissionDenied { .. }));

    for sql in [
        "UPDATE \"TLE_ROLE\" SET superuser = 1",
        "SELECT * FROM [tle_extension]",
        "SELECT * FROM `Tle_Proc`",
        "DELETE FROM 'tle_depend'",
        "SELECT * FROM main.TLE_EXTENSION",
    ] {
        let err = session.execute(sql).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }), "{sql}: {err}");
    }

    let err = session
        .execute("CREATE FUNCTION peek() RETURNS integer LANGUAGE sql AS $$SELECT count(*) FROM \"tle_role\"$$")
        .unwrap_err();
    assert_eq!(err.to_string(), "permission denied for table tle_role");
}

#[test]
fn test_reserved_schema_is_guarded() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    let err = session
        .execute("CREATE FUNCTION tle.install_extension(a text) RETURNS text LANGUAGE sql AS $$SELECT a$$")
        .unwrap_err();
    assert_eq!(err.to_string(), "tle schema reserved for tle functions");

    let err = session.execute("DROP FUNCTION tle.set_default_version(text, text)").unwrap_err();
    assert_eq!(err.to_string(), "altering tle functions in tle schema not allowed");
}

#[test]
fn test_engine_cannot_be_dropped_under_stored_files() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    session
        .execute("SELECT tle.install_extension('pinned', '1.0', 'pinned', $$SELECT 1;$$)")
        .unwrap();
    let err = session.execute("DROP EXTENSION tle").unwrap_err();
    assert_eq!(err.hint(), Some("Uninstall the stored extensions first."));

    session.execute("SELECT tle.uninstall('pinned')").unwrap();
    session.execute("DROP EXTENSION tle").unwrap();
    assert!(Extension::find_by_name(session.conn(), "tle").unwrap().is_none());
}

#[test]
fn test_config_dump_from_script() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    session
        .execute(
            "SELECT tle.install_extension('dumped', '1.0', 'dumped', $_tle_$\
             CREATE TABLE dumped_cfg(k text, v text);\
             SELECT tle.extension_config_dump('dumped_cfg', 'WHERE k IS NOT NULL');\
             $_tle_$)",
        )
        .unwrap();
    session.execute("CREATE EXTENSION dumped").unwrap();

    let ext = Extension::find_by_name(session.conn(), "dumped").unwrap().unwrap();
    assert_eq!(ext.config_tables, Some(vec!["dumped_cfg".to_string()]));
    assert_eq!(ext.config_conditions, Some(vec!["WHERE k IS NOT NULL".to_string()]));

    let err = session
        .execute("SELECT tle.extension_config_dump('dumped_cfg', '')")
        .unwrap_err();
    assert!(matches!(err, Error::FeatureNotSupported(_)));
}

#[test]
fn test_feature_registry_through_sql() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    session
        .execute("CREATE FUNCTION strong(text) RETURNS boolean LANGUAGE sql AS $$SELECT length($1) >= 12$$")
        .unwrap();
    let registered = session
        .query("SELECT tle.register_feature_if_not_exists('strong', 'passcheck')")
        .unwrap();
    assert_eq!(registered.first_value(), Some(&Value::Bool(true)));
    assert_eq!(
        tlext::feature::feature_proc(session.conn(), Feature::Passcheck).unwrap(),
        vec!["main.strong".to_string()]
    );

    let err = session.execute("ALTER FUNCTION strong(text) OWNER TO tle_admin").unwrap_err();
    assert!(matches!(err, Error::FeatureNotSupported(_)));

    session.execute("SELECT tle.unregister_feature('strong', 'passcheck')").unwrap();
    assert!(
        tlext::feature::feature_proc(session.conn(), Feature::Passcheck)
            .unwrap()
            .is_empty()
    );
}
