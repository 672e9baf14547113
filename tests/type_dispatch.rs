mod common;

use serde_json::json;
use slotbase::construct::{Key, TypeDef, TypeRef};
use slotbase::datatype::{Environment, Representation};
use slotbase::remote::Reply;
use slotbase::SlotbaseError;

use common::{admin, database, database_with, node_with, reader, RecordingTransport};

#[test]
fn builtin_types_resolve_by_name_and_identity() {
    let db = database();
    let integer = db.soft_type(&TypeRef::from("integer")).expect("by name");
    assert_eq!(integer.name(), "INTEGER");
    let def = db.type_def(&TypeRef::from("INTEGER")).expect("def");
    assert!(def.is_primitive());
    let by_id = db.soft_type(&TypeRef::from(def.id().expect("id"))).expect("by id");
    assert_eq!(by_id.name(), "INTEGER");
}

#[test]
fn unknown_type_is_reported() {
    let db = database();
    assert!(matches!(
        db.soft_type(&TypeRef::from("MONEY")),
        Err(SlotbaseError::UnknownType(_))
    ));
    let mut node = node_with(&db, "ledger", &[]);
    assert!(matches!(
        db.create_key(&admin(), &mut node, Key::new("amount", "MONEY", 10)),
        Err(SlotbaseError::UnknownType(_))
    ));
    assert!(node.keys().is_empty());
}

#[test]
fn type_names_are_unique() {
    let db = database();
    db.create_type(&admin(), TypeDef::remote("zip", "http://v/zip", "http://r/zip"))
        .expect("remote type");
    assert!(matches!(
        db.create_type(&admin(), TypeDef::remote("ZIP", "http://v/zip2", "http://r/zip2")),
        Err(SlotbaseError::DuplicateType(_))
    ));
    assert!(matches!(
        db.create_type(&admin(), TypeDef::local("STRING")),
        Err(SlotbaseError::DuplicateType(_))
    ));
    assert!(matches!(
        db.create_type(&reader(), TypeDef::remote("phone", "http://v/p", "http://r/p")),
        Err(SlotbaseError::PermissionDenied { .. })
    ));
}

#[test]
fn remote_types_post_to_their_endpoints() {
    let transport = RecordingTransport::new(|url, body| match url {
        "http://v/zip" if body["value"].as_str().map(|v| v.len() == 5).unwrap_or(false) => Reply {
            status: 200,
            body: String::new(),
        },
        "http://v/zip" => Reply {
            status: 400,
            body: "zip codes have five digits".into(),
        },
        _ => Reply {
            status: 200,
            body: "<zip/>".into(),
        },
    });
    let db = database_with(transport.clone());
    db.create_type(&admin(), TypeDef::remote("ZIP", "http://v/zip", "http://r/zip"))
        .expect("remote type");
    let zip = db.soft_type(&TypeRef::from("zip")).expect("zip");

    zip.validate(&json!("12345"), 10).expect("valid");
    match zip.validate(&json!("1234"), 10) {
        Err(SlotbaseError::ValidationFailed(body)) => assert_eq!(body, "zip codes have five digits"),
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
    // size is checked before any call goes out
    assert!(matches!(
        zip.validate(&json!("123456789012"), 10),
        Err(SlotbaseError::SizeExceeded { expected: 10, given: 12 })
    ));
    assert_eq!(transport.calls_to("http://v/zip").len(), 2);

    let environment = Environment::for_mimetype("application/html").with("theme", "dark");
    assert_eq!(
        zip.render(&json!("12345"), &environment).expect("rendered"),
        Representation::Text("<zip/>".into())
    );
    assert_eq!(
        transport.calls_to("http://r/zip"),
        vec![json!({"value": "12345", "environment": {"return_mimetype": "application/html", "theme": "dark"}})]
    );
}

#[test]
fn local_type_without_handler_cannot_be_created() {
    let db = database();
    assert!(matches!(
        db.create_type(&admin(), TypeDef::local("GEOMETRY")),
        Err(SlotbaseError::UnknownType(_))
    ));
}
