use httpmock::prelude::*;
use raptor_check::adapters::TrektellenSource;
use raptor_check::core::ConfigProvider;
use raptor_check::{
    CheckPipeline, EtlEngine, LocalStorage, RunDecision, RunOutcome, Station, TomlConfig,
};
use tempfile::TempDir;

const EXPORT: &str = "\
countid,date,timestamp,telpost,speciesid,speciesname,count,countback,local,age,sex,plumage,remark,location,migtype,counttype,year,yday
1,2018-10-06,09:00:00,1047,1,HB_AD,2,0,0,,,,,O,,,2018,279
2,2018-10-06,09:01:00,1047,1,HB,1,0,0,,,,,O,,,2018,279
3,2018-10-06,09:30:00,1048,2,BK,6,0,0,,,,,E2,,,2018,279
";

fn config(server: &MockServer, output: &str) -> TomlConfig {
    let content = format!(
        r#"
[run]
date = "20181006"

[checks]
focus_start = "2018-08-20"
focus_end = "2018-09-10"

[source]
type = "trektellen"
login_url = "{login}"
success_url = "{home}"
username = "counter"
password = "secret"
count_url = "{count}"
download_url = "{download}"

[load]
output_path = "{output}"
"#,
        login = server.url("/user/login"),
        home = server.url("/home"),
        count = server.url("/count/view"),
        download = server.url("/export/"),
        output = output,
    );
    TomlConfig::from_toml_str(&content).unwrap()
}

async fn mock_portal(server: &MockServer, station2_published: bool) {
    server.mock_async(|when, then| {
        when.method(POST).path("/user/login").body_contains("identity=counter");
        then.status(302).header("location", "/home");
    }).await;
    server.mock_async(|when, then| {
        when.method(GET).path("/home");
        then.status(200).body("welcome");
    }).await;
    server.mock_async(|when, then| {
        when.method(GET).path("/count/view/1047/20181006");
        then.status(200).body("counts");
    }).await;
    if station2_published {
        server.mock_async(|when, then| {
            when.method(GET).path("/count/view/1048/20181006");
            then.status(200).body("counts");
        }).await;
    } else {
        server.mock_async(|when, then| {
            when.method(GET).path("/count/view/1048/20181006");
            then.status(302).header("location", "/count/view");
        }).await;
        server.mock_async(|when, then| {
            when.method(GET).path("/count/view");
            then.status(200).body("no counts");
        }).await;
    }
    server.mock_async(|when, then| {
        when.method(GET).path("/export/2018");
        then.status(200)
            .header("Content-Type", "text/csv")
            .body(EXPORT);
    }).await;
}

fn engine(
    config: TomlConfig,
) -> EtlEngine<CheckPipeline<LocalStorage, TomlConfig, TrektellenSource>> {
    let storage = LocalStorage::new(config.output_path().to_string());
    let source = TrektellenSource::new(config.trektellen_settings().unwrap()).unwrap();
    EtlEngine::new(CheckPipeline::new(storage, config, source))
}

#[tokio::test]
async fn test_trektellen_day_run() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().display().to_string();
    let server = MockServer::start_async().await;
    mock_portal(&server, true).await;

    let outcome = engine(config(&server, &output))
        .run_unless_done(false)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Processed(_)));

    let s1 = std::fs::read_to_string(temp_dir.path().join("inprogress/20181006_S1.csv")).unwrap();
    assert!(s1.contains(",HB_NONJUV,2,"));
    assert!(s1.contains("mismatch number of counted and aged birds"));

    let raw_s2 = std::fs::read_to_string(temp_dir.path().join("raw/20181006_S2.csv")).unwrap();
    assert_eq!(raw_s2.lines().count(), 2);
    assert!(raw_s2.contains("2. Shuamta"));
}

#[tokio::test]
async fn test_waits_for_missing_station_unless_forced() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().display().to_string();
    let server = MockServer::start_async().await;
    mock_portal(&server, false).await;

    let outcome = engine(config(&server, &output))
        .run_unless_done(false)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Skipped(RunDecision::AwaitingUpload(vec![Station::Sakhalvasho]))
    );
    assert!(!temp_dir.path().join("raw").exists());

    let forced = engine(config(&server, &output))
        .run_unless_done(true)
        .await
        .unwrap();
    assert!(matches!(forced, RunOutcome::Processed(_)));
    assert!(temp_dir.path().join("raw/20181006_S1.csv").is_file());
}
