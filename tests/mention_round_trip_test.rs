//! Mention round trip tests
//!
//! Plain comment text with `@Name` references is turned into mention nodes,
//! serialized to HTML for storage and parsed back without loss.

use spms_workflow::domain::UserSummary;
use spms_workflow::mentions::{mentioned_users, parse_html, prepopulate, to_html, Block, Inline};

fn roster() -> Vec<UserSummary> {
    vec![
        UserSummary {
            pk: 7,
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane.doe@example.com".into(),
            is_superuser: false,
        },
        UserSummary {
            pk: 8,
            first_name: "John".into(),
            last_name: "Smith".into(),
            email: "john.smith@example.com".into(),
            is_superuser: false,
        },
    ]
}

#[test]
fn test_plain_text_mention_round_trip() {
    let text = "Hello @Jane Doe, please review";
    let editor = prepopulate(text, &roster()).unwrap();

    match &editor.blocks[..] {
        [Block::Paragraph { children }] => {
            assert_eq!(children.len(), 3);
            assert_eq!(children[0], Inline::text("Hello "));
            match &children[1] {
                Inline::Mention(mention) => {
                    assert_eq!(mention.user_pk, 7);
                    assert_eq!(mention.name, "Jane Doe");
                    assert_eq!(mention.email, "jane.doe@example.com");
                    assert_eq!(mention.text, "@Jane Doe");
                }
                other => panic!("expected mention, got {other:?}"),
            }
            assert_eq!(children[2], Inline::text(", please review"));
        }
        other => panic!("expected one paragraph, got {other:?}"),
    }

    let html = to_html(&editor);
    assert!(html.contains(r#"data-user-id="7""#));
    assert!(html.contains(r#"data-user-email="jane.doe@example.com""#));

    let reparsed = parse_html(&html);
    assert_eq!(reparsed, editor);
    assert_eq!(reparsed.plain_text(), text);
}

#[test]
fn test_reprepopulating_stored_html_is_stable() {
    let first = prepopulate("<p>@John Smith and @Jane Doe</p>", &roster()).unwrap();
    let stored = to_html(&first);
    let second = prepopulate(&stored, &roster()).unwrap();

    assert_eq!(second, first);
    assert_eq!(to_html(&second), stored);
}

#[test]
fn test_unknown_names_stay_text() {
    let editor = prepopulate("Thanks @Someone Else", &roster()).unwrap();
    assert!(mentioned_users(&editor).is_empty());
    assert_eq!(editor.plain_text(), "Thanks @Someone Else");
}

#[test]
fn test_notification_targets_follow_first_appearance() {
    let editor = prepopulate(
        "@John Smith can you loop in @Jane Doe? cc @John Smith",
        &roster(),
    )
    .unwrap();
    let users = mentioned_users(&editor);
    assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![8, 7]);
    assert_eq!(users[1].name, "Jane Doe");
}
