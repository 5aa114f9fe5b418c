use uow_domain::entity::Entity;
use uow_macros::entity;

#[entity]
struct Customer {
    #[key]
    id: u64,
    name: String,
}

#[entity(name = "audit_note", validate = check_note, debug = false)]
#[derive(PartialEq)]
struct Note {
    #[key]
    id: String,
    body: String,
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Note({})", self.id)
    }
}

fn check_note(note: &Note) -> Result<(), String> {
    if note.body.is_empty() {
        return Err("empty body".into());
    }
    Ok(())
}

fn main() {
    assert_eq!(Customer::TYPE, "customer");
    assert_eq!(Customer::KEY_MEMBERS, &["id"]);

    let c = Customer {
        id: 7,
        name: "ann".into(),
    };
    let key: u64 = c.key();
    assert_eq!(key, 7);
    assert!(c.validate().is_ok());
    let _ = format!("{:?}", c.clone());

    assert_eq!(Note::TYPE, "audit_note");
    let n = Note {
        id: "n-1".into(),
        body: String::new(),
    };
    assert_eq!(n.validate(), Err("empty body".to_string()));
    assert_eq!(format!("{:?}", n), "Note(n-1)");
    assert!(n == n.clone());
}
