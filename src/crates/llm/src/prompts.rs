//! Prompt templates for the typed gateway operations
//!
//! Each function returns the `(system, user)` prompt pair for one
//! operation. The templates pin the output contract (field names, closed
//! vocabularies) so the gateway can parse strictly.

/// Intent classification + entity extraction (fused call)
pub fn classify_and_extract(
    question: &str,
    available_intents: &[&str],
    entity_types: &[&str],
    chat_history: &str,
) -> (String, String) {
    let system = format!(
        "You classify questions about a corporate knowledge graph and extract entities.\n\
         Valid intents: {intents}. Use \"unknown\" when none fits.\n\
         Entity types: {types}.\n\
         Respond with JSON only:\n\
         {{\"intent\": \"...\", \"confidence\": 0.0, \
         \"entities\": [{{\"type\": \"...\", \"value\": \"...\", \"normalized\": \"...\"}}]}}\n\
         confidence is a number between 0 and 1. normalized is optional.",
        intents = available_intents.join(", "),
        types = entity_types.join(", "),
    );

    let user = if chat_history.is_empty() {
        format!("Question: {question}")
    } else {
        format!("Conversation so far:\n{chat_history}\n\nQuestion: {question}")
    };

    (system, user)
}

/// Multi-hop query decomposition
pub fn decompose_query(question: &str) -> (String, String) {
    let system = "You decompose graph questions into traversal hops.\n\
         Respond with JSON only:\n\
         {\"is_multi_hop\": true, \"hop_count\": 2, \
         \"hops\": [{\"description\": \"...\", \"relationship\": \"...\", \
         \"direction\": \"out\", \"filter\": \"...\"}], \
         \"final_return\": \"...\", \"explanation\": \"...\"}\n\
         direction is one of in, out, both. filter is optional."
        .to_string();

    (system, format!("Question: {question}"))
}

/// Cypher generation from question + schema + entities (+ optional plan)
pub fn generate_cypher(
    question: &str,
    schema: &str,
    entities: &str,
    plan: Option<&str>,
) -> (String, String) {
    let system = "You write Cypher for a Neo4j property graph.\n\
         Use only the labels, relationship types and properties from the \
         provided schema. Parameterise every literal with $name placeholders.\n\
         Respond with JSON only:\n\
         {\"cypher\": \"MATCH ...\", \"parameters\": {\"name\": \"...\"}, \
         \"explanation\": \"...\"}"
        .to_string();

    let mut user = format!(
        "Schema:\n{schema}\n\nEntities:\n{entities}\n\nQuestion: {question}"
    );
    if let Some(plan) = plan {
        user.push_str(&format!("\n\nQuery plan:\n{plan}"));
    }

    (system, user)
}

/// Natural-language answer from query results
pub fn generate_response(question: &str, results: &str, cypher: &str) -> (String, String) {
    let system = "You summarise graph query results as a concise, helpful \
         answer in the language of the question. Mention only facts present \
         in the results."
        .to_string();

    let user = format!(
        "Question: {question}\n\nExecuted query:\n{cypher}\n\nResults:\n{results}"
    );

    (system, user)
}

/// Clarification question for unresolved entities
pub fn generate_clarification(question: &str, unresolved_entities: &str) -> (String, String) {
    let system = "The user's question mentioned entities that could not be \
         matched in the knowledge graph. Write a short, polite question in \
         the language of the user's question asking them to clarify the \
         listed terms."
        .to_string();

    let user = format!(
        "Question: {question}\n\nUnresolved entities: {unresolved_entities}"
    );

    (system, user)
}

/// Organisation-wide community summary
pub fn community_summary(context: &str, question: &str) -> (String, String) {
    let system = "You analyse organisation-wide statistics from a corporate \
         knowledge graph and answer macro-level questions. Base every claim \
         on the provided context."
        .to_string();

    let user = format!("Context:\n{context}\n\nQuestion: {question}");

    (system, user)
}

/// Ontology analysis of an unresolved term
pub fn ontology_analysis(
    term: &str,
    category: &str,
    question: &str,
    known_concepts: &str,
) -> (String, String) {
    let system = format!(
        "You maintain the ontology of a corporate knowledge graph. Decide \
         how an unresolved term should extend it.\n\
         Known concepts in this category:\n{known_concepts}\n\
         Respond with JSON only:\n\
         {{\"type\": \"NEW_CONCEPT|NEW_SYNONYM|NEW_RELATION\", \
         \"action\": \"...\", \"parent\": \"...\", \"canonical\": \"...\", \
         \"confidence\": 0.0}}\n\
         parent and canonical are optional. confidence is between 0 and 1."
    );

    let user = format!(
        "Term: {term}\nCategory: {category}\nQuestion it appeared in: {question}"
    );

    (system, user)
}

/// Parse a chat-initiated ontology update request
pub fn ontology_update_parser(question: &str) -> (String, String) {
    let system = "Parse a user's request to change the ontology.\n\
         Respond with JSON only:\n\
         {\"action\": \"add_concept|add_synonym|add_relation\", \
         \"term\": \"...\", \"category\": \"...\", \"target\": \"...\", \
         \"relation_type\": \"...\", \"confidence\": 0.0, \
         \"reasoning\": \"...\"}\n\
         target and relation_type are optional. confidence reflects how \
         clearly the request maps onto one action."
        .to_string();

    (system, format!("Request: {question}"))
}
