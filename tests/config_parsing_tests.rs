use std::io::Write;

use webserv::config;

fn write_temp_conf(contents: &str) -> tempfile_like::TempConf {
    tempfile_like::TempConf::new(contents)
}

/// Minimal drop-cleaned temp file helper: avoids pulling in a `tempfile`
/// dependency for a handful of integration tests.
mod tempfile_like {
    use std::fs;
    use std::path::PathBuf;

    pub struct TempConf {
        pub path: PathBuf,
    }

    impl TempConf {
        pub fn new(contents: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!(
                "webserv_test_{}_{}.conf",
                std::process::id(),
                contents.len()
            ));
            let mut f = fs::File::create(&path).unwrap();
            use std::io::Write as _;
            f.write_all(contents.as_bytes()).unwrap();
            TempConf { path }
        }
    }

    impl Drop for TempConf {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[test]
fn loads_a_minimal_valid_config() {
    let conf = write_temp_conf(
        r#"
        error_log logs/error.log info;
        events { worker_connections 256; }
        http {
            server {
                listen 127.0.0.1:8099;
                server_name test.local;
                root .;
                location / {
                    methods GET;
                }
            }
        }
        "#,
    );

    let config = config::load(&conf.path).expect("valid config should load");
    assert_eq!(config.main.worker_connections, 256);
    assert_eq!(config.servers.len(), 1);
    assert_eq!(config.servers[0].server_name, "test.local");
    assert_eq!(config.servers[0].listen[0].port, 8099);
}

#[test]
fn rejects_config_missing_http_block() {
    let conf = write_temp_conf("error_log logs/error.log info;\n");
    let err = config::load(&conf.path).unwrap_err();
    assert!(format!("{err}").contains("http"));
}

#[test]
fn rejects_unknown_top_level_directive() {
    let conf = write_temp_conf("frobnicate yes;\nhttp { server { location / {} } }\n");
    assert!(config::load(&conf.path).is_err());
}

#[test]
fn rejects_duplicate_server_bindings_at_validate_time() {
    let conf = write_temp_conf(
        r#"
        http {
            server {
                listen 0.0.0.0:9001;
                root .;
                location / {}
            }
            server {
                listen 0.0.0.0:9001;
                root .;
                location / {}
            }
        }
        "#,
    );
    let err = config::load(&conf.path).unwrap_err();
    assert!(format!("{err}").contains("duplicate"));
}

#[test]
fn resolves_include_directives_relative_to_including_file() {
    let mut included_path = std::env::temp_dir();
    included_path.push(format!("webserv_test_included_{}.conf", std::process::id()));
    {
        let mut f = std::fs::File::create(&included_path).unwrap();
        f.write_all(b"location / { methods GET POST; }\n").unwrap();
    }

    let outer_src = format!(
        r#"
        http {{
            server {{
                listen 0.0.0.0:9002;
                root .;
                include {};
            }}
        }}
        "#,
        included_path.display()
    );
    let conf = write_temp_conf(&outer_src);

    let config = config::load(&conf.path).expect("include should resolve");
    assert_eq!(
        config.servers[0].routes[0].methods,
        vec!["GET".to_string(), "POST".to_string()]
    );

    let _ = std::fs::remove_file(&included_path);
}

#[test]
fn parses_mime_types_block() {
    let conf = write_temp_conf(
        r#"
        http {
            types {
                text/html html;
                image/png png;
            }
            server {
                root .;
                location / {}
            }
        }
        "#,
    );
    let config = config::load(&conf.path).unwrap();
    assert_eq!(config.mime_types.get("text/html"), Some(&"html".to_string()));
    assert_eq!(config.mime_types.get("image/png"), Some(&"png".to_string()));
}
