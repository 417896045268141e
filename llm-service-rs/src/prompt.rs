// llm-service-rs/src/prompt.rs
// Prompt assembly for text-to-SQL generation. Pure string functions:
// identical inputs always produce identical output, which the generation
// service relies on when stripping the echoed prompt prefix.

/// Instruction template for SQL generation. `{table_str}` and `{question}`
/// are substituted by [`render_prompt`].
pub const TEXT_TO_SQL_PROMPT_TEMPLATE: &str = "You are a SQL expert.

                        Given the question, original query, generate a SQL query to answer the question. Follow the response format and guidelines strictly. Do not include any additional text outside the specified format.

                        Use the table schema below!
                        ===Tables===
                        {table_str}

                        ===Response Guidelines===
                        1. Ensure the SQL is properly formatted.
                        2. Always return a valid JSON object using the structure below.

                        ===Response Format===
                        query=<SQL query if sufficient context is available>,

                        <rule>
                        Stop after generating the SQL query!
                        <rule>

                        ===Question===
                        {question}
                        ";

/// Returned without invoking the model when a question is flagged as too
/// ambiguous to yield a usable SQL query.
pub const IS_TOO_VAGUE_MESSAGE: &str =
    "The text is too vague to be processed and used to generate a proper SQL query";

/// Join headers into a synthetic schema string. Every header is assumed
/// textual; the corpus carries no per-column type information.
pub fn build_table_str(headers: &[String]) -> String {
    headers
        .iter()
        .map(|h| format!("{} (text)", h))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Substitute schema string and question into the instruction template.
pub fn render_prompt(table_str: &str, question: &str) -> String {
    TEXT_TO_SQL_PROMPT_TEMPLATE
        .replace("{table_str}", table_str)
        .replace("{question}", question)
}
