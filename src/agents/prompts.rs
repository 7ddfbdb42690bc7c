//! Prompt templates for the research pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::types::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    ResearchReport,
    ResourceReport,
    OutlineReport,
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportType::ResearchReport => "research_report",
            ReportType::ResourceReport => "resource_report",
            ReportType::OutlineReport => "outline_report",
        };
        f.write_str(name)
    }
}

impl FromStr for ReportType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research_report" | "research" => Ok(ReportType::ResearchReport),
            "resource_report" | "resource" => Ok(ReportType::ResourceReport),
            "outline_report" | "outline" => Ok(ReportType::OutlineReport),
            other => Err(AppError::InvalidRequest(format!("Unknown report type: {}", other))),
        }
    }
}

fn today() -> String {
    Local::now().format("%B %d, %Y").to_string()
}

/// System prompt for picking a research persona.
pub fn auto_agent_instructions() -> &'static str {
    r#"This task involves researching a given topic, regardless of its complexity or the availability of a definitive answer. The research is conducted by a specific server, defined by its type and role, with each server requiring distinct instructions.

Agent
The server is determined by the field of the topic and the specific name of the server that could be utilized to research the topic provided. Agents are categorized by their area of expertise, and each server type is associated with a corresponding emoji.

examples:
task: "should I invest in apple stocks?"
response:
{
    "server": "💰 Finance Agent",
    "agent_role_prompt": "You are a seasoned finance analyst AI assistant. Your primary goal is to compose comprehensive, astute, impartial, and methodically arranged financial reports based on provided data and trends."
}
task: "could reselling sneakers become profitable?"
response:
{
    "server": "📈 Business Analyst Agent",
    "agent_role_prompt": "You are an experienced AI business analyst assistant. Your main objective is to produce comprehensive, insightful, impartial, and systematically structured business reports based on provided business data, market trends, and strategic analysis."
}
task: "what are the most interesting sites in Tel Aviv?"
response:
{
    "server": "🌍 Travel Agent",
    "agent_role_prompt": "You are a world-travelled AI tour guide assistant. Your main purpose is to draft engaging, insightful, unbiased, and well-structured travel reports on given locations, including history, attractions, and cultural insights."
}

Respond with ONLY the JSON object."#
}

pub fn generate_search_queries_prompt(task: &str, max_queries: usize) -> String {
    format!(
        r#"Write {max_queries} google search queries to search online that form an objective opinion from the following: "{task}"
Use the current date if needed: {date}.
You must respond with a list of strings in the following format: ["query 1", "query 2", "query 3"].
Respond with ONLY the JSON array."#,
        max_queries = max_queries,
        task = task,
        date = today(),
    )
}

pub fn generate_summary_prompt(query: &str, data: &str) -> String {
    format!(
        r#"{data}
Using the above text, summarize it based on the following task or query: "{query}".
If the query cannot be answered using the text, YOU MUST summarize the text in short.
Include all factual information such as numbers, stats, quotes, etc if available."#,
        data = data,
        query = query,
    )
}

pub fn generate_report_prompt(
    report_type: ReportType,
    question: &str,
    context: &str,
    report_format: &str,
    total_words: u32,
) -> String {
    match report_type {
        ReportType::ResearchReport => research_report_prompt(question, context, report_format, total_words),
        ReportType::ResourceReport => resource_report_prompt(question, context, total_words),
        ReportType::OutlineReport => outline_report_prompt(question, context),
    }
}

fn research_report_prompt(question: &str, context: &str, report_format: &str, total_words: u32) -> String {
    format!(
        r#"Information: """{context}"""

Using the above information, answer the following query or task: "{question}" in a detailed report.
The report should focus on the answer to the query, should be well structured, informative, in depth and comprehensive, with facts and numbers if available and a minimum of {total_words} words.
You should strive to write the report as long as you can using all relevant and necessary information provided.
You must write the report with markdown syntax.
Use an unbiased and journalistic tone.
You MUST determine your own concrete and valid opinion based on the given information. Do NOT defer to general and meaningless conclusions.
You MUST write all used source urls at the end of the report as references, and make sure to not add duplicated sources, but only one reference for each.
You MUST write the report in {report_format} format.
Cite search results using inline notations. Only cite the most relevant results that answer the query accurately. Place these citations at the end of the sentence or paragraph that reference them.
Please do your best, this is very important to my career.
Assume that the current date is {date}."#,
        context = context,
        question = question,
        total_words = total_words,
        report_format = report_format,
        date = today(),
    )
}

fn resource_report_prompt(question: &str, context: &str, total_words: u32) -> String {
    format!(
        r#""""{context}"""

Based on the above information, generate a bibliography recommendation report for the following question or topic: "{question}".
The report should provide a detailed analysis of each recommended resource, explaining how each source can contribute to finding answers to the research question.
Focus on the relevance, reliability, and significance of each source.
Ensure that the report is well-structured, informative, in-depth, and follows Markdown syntax.
Include relevant facts, figures, and numbers whenever available.
The report should have a minimum length of {total_words} words."#,
        context = context,
        question = question,
        total_words = total_words,
    )
}

fn outline_report_prompt(question: &str, context: &str) -> String {
    format!(
        r#""""{context}"""

Using the above information, generate an outline for a research report in Markdown syntax for the following question or topic: "{question}".
The outline should provide a well-structured framework for the research report, including the main sections, subsections, and key points to be covered.
The research report should be detailed, informative, in-depth, and a minimum of 1,200 words.
Use appropriate Markdown syntax to format the outline and ensure readability."#,
        context = context,
        question = question,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_parsing() {
        assert_eq!("research_report".parse::<ReportType>().unwrap(), ReportType::ResearchReport);
        assert_eq!("Outline".parse::<ReportType>().unwrap(), ReportType::OutlineReport);
        assert!("essay".parse::<ReportType>().is_err());

        let parsed: ReportType = serde_json::from_str("\"resource_report\"").unwrap();
        assert_eq!(parsed, ReportType::ResourceReport);
        assert_eq!(ReportType::default().to_string(), "research_report");
    }

    #[test]
    fn test_report_prompts_embed_inputs() {
        let prompt = generate_report_prompt(ReportType::ResearchReport, "Is Rust fast?", "ctx", "apa", 800);
        assert!(prompt.contains("\"Is Rust fast?\""));
        assert!(prompt.contains("a minimum of 800 words"));
        assert!(prompt.contains("in apa format"));

        let prompt = generate_report_prompt(ReportType::OutlineReport, "Is Rust fast?", "ctx", "apa", 800);
        assert!(prompt.contains("generate an outline"));
    }

    #[test]
    fn test_search_queries_prompt() {
        let prompt = generate_search_queries_prompt("solar energy", 3);
        assert!(prompt.starts_with("Write 3 google search queries"));
        assert!(prompt.contains("\"solar energy\""));
    }
}
