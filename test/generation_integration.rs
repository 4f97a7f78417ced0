//! End-to-end generation tests
//!
//! Corpus file in, conversation file out, through the library API.

use chatgen::{
    load_corpus, write_conversations, ChatgenConfig, ConversationGenerator, ConversationRecord,
    Corpus, ExportFormat, Record, Tier,
};
use std::collections::HashSet;
use std::fs;

fn single_record_corpus() -> Corpus {
    Corpus::new([
        vec![Record::new("a", "", "Hi?", "Hello.")],
        vec![Record::new("b", "", "Price?", "Ten.")],
        vec![Record::new("c", "", "Cheaper?", "No.")],
        vec![Record::new("z", "", "Bye.", "Bye!")],
    ])
}

fn shop_corpus() -> Corpus {
    Corpus::new([
        vec![
            Record::new("A1", "", "Do you sell bikes?", "Yes, city and road bikes."),
            Record::new("A2", "", "Where is the shop?", "Next to the station."),
        ],
        vec![
            Record::new("B1", "A1", "How much is a city bike?", "From 400 euros."),
            Record::new("B2", "A2", "Is there parking?", "Yes, behind the shop."),
            Record::new("B3", "", "Do you repair bikes?", "Every weekday."),
        ],
        vec![
            Record::new("C1", "B1", "Any discount for students?", "Ten percent."),
            Record::new("C2", "B3", "How long does a repair take?", "Usually a day."),
        ],
        vec![
            Record::new("Z1", "", "Thanks, that's all.", "Have a nice ride!"),
            Record::new("Z2", "", "Great, see you.", "See you soon."),
        ],
    ])
}

#[test]
fn test_single_round_single_dialogue() {
    let corpus = single_record_corpus();
    let mut config = ChatgenConfig::default();
    config.generation.generate_times = 1;
    config.generation.max_depth = 1;
    config.generation.seed = Some(0);

    let output = ConversationGenerator::new(&corpus, &config)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(output.conversations.len(), 1);
    let record = &output.conversations[0];
    assert!(record.history.is_empty());
    assert_eq!(record.instruction, "You are a helpful assistant.");
    let known: HashSet<(&str, &str)> = [
        ("Hi?", "Hello."),
        ("Price?", "Ten."),
        ("Cheaper?", "No."),
        ("Bye.", "Bye!"),
    ]
    .into_iter()
    .collect();
    assert!(known.contains(&(record.input.as_str(), record.output.as_str())));
    assert_eq!(output.counters.total(), 1);
}

#[test]
fn test_empty_prompt_falls_back_to_default() {
    let corpus = single_record_corpus();
    let mut config = ChatgenConfig::default();
    config.generation.generate_times = 3;
    config.generation.seed = Some(1);
    config.generation.system_prompt = String::new();

    let output = ConversationGenerator::new(&corpus, &config)
        .unwrap()
        .run()
        .unwrap();
    assert!(output
        .conversations
        .iter()
        .all(|r| r.instruction == "You are a helpful assistant."));
}

#[test]
fn test_every_round_comes_from_corpus() {
    let corpus = shop_corpus();
    let pairs: HashSet<[String; 2]> = corpus.cells().map(|(_, r)| r.qa_pair()).collect();

    let mut config = ChatgenConfig::default();
    config.generation.generate_times = 300;
    config.generation.max_depth = 6;
    config.generation.seed = Some(2024);

    let output = ConversationGenerator::new(&corpus, &config)
        .unwrap()
        .run()
        .unwrap();

    let mut rounds = 0;
    for record in &output.conversations {
        assert!(record.rounds() <= 6);
        for pair in &record.history {
            assert!(pairs.contains(pair));
        }
        assert!(pairs.contains(&[record.input.clone(), record.output.clone()]));
        rounds += record.rounds();
    }
    assert_eq!(output.counters.total(), rounds);

    // Openings are dominated by tier A, so A must show up
    assert!(output.counters.get(Tier::A) > 0);
    let proportions = output.counters.proportions();
    assert!((proportions.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn test_openings_favor_tier_a() {
    let corpus = shop_corpus();
    let mut config = ChatgenConfig::default();
    config.generation.generate_times = 500;
    config.generation.max_depth = 1;
    config.generation.seed = Some(99);

    let output = ConversationGenerator::new(&corpus, &config)
        .unwrap()
        .run()
        .unwrap();

    let tier_a: HashSet<&str> = corpus.tier(Tier::A).iter().map(|r| r.question.as_str()).collect();
    let openings_in_a = output
        .conversations
        .iter()
        .filter(|r| tier_a.contains(r.input.as_str()))
        .count();
    // Expected share is 0.9
    assert!(openings_in_a >= 400, "{} of 500", openings_in_a);
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rows.jsonl");
    let rows = [
        r#"{"UID": "A1", "Parent": "", "Level": "A", "Well-formed questions": "Hallo?", "Well-formed answers": "Grüß Gott!"}"#,
        r#"{"UID": "B1", "Parent": "A1", "Level": "B", "Well-formed questions": "Preis?", "Well-formed answers": "Fünf Euro."}"#,
        r#"{"UID": "C1", "Parent": "B1", "Level": "C", "Well-formed questions": "Rabatt?", "Well-formed answers": "Nein."}"#,
        r#"{"UID": "Z1", "Parent": "", "Level": "Z", "Well-formed questions": "Danke.", "Well-formed answers": "Tschüss!"}"#,
    ];
    fs::write(&input, rows.join("\n")).unwrap();

    let corpus = load_corpus(&input).unwrap();
    assert_eq!(corpus.len(), 4);

    let mut config = ChatgenConfig::default();
    config.generation.generate_times = 20;
    config.generation.max_depth = 3;
    config.generation.seed = Some(5);
    let output = ConversationGenerator::new(&corpus, &config)
        .unwrap()
        .run()
        .unwrap();

    let json_path = dir.path().join("out.json");
    write_conversations(&json_path, &output.conversations, ExportFormat::Json).unwrap();
    let text = fs::read_to_string(&json_path).unwrap();
    assert!(!text.contains("\\u"));
    let loaded: Vec<ConversationRecord> = serde_json::from_str(&text).unwrap();
    assert_eq!(loaded, output.conversations);

    let jsonl_path = dir.path().join("out.jsonl");
    write_conversations(&jsonl_path, &output.conversations, ExportFormat::JsonLines).unwrap();
    let loaded: Vec<ConversationRecord> = fs::read_to_string(&jsonl_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(loaded, output.conversations);
}

#[test]
fn test_worker_count_changes_stream_not_shape() {
    let corpus = shop_corpus();
    let mut config = ChatgenConfig::default();
    config.generation.generate_times = 50;
    config.generation.max_depth = 4;
    config.generation.seed = Some(8);

    for workers in [1, 2, 4, 64] {
        config.generation.workers = workers;
        let output = ConversationGenerator::new(&corpus, &config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(output.conversations.len(), 50);
        let rounds: usize = output.conversations.iter().map(|r| r.rounds()).sum();
        assert_eq!(output.counters.total(), rounds);
    }
}
