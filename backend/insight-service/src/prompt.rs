//! Insight generation prompt

/// Minimum number of entries requested for every list-valued field
pub const MIN_LIST_ENTRIES: usize = 5;

/// Build the generation prompt for one industry
pub fn build_insight_prompt(industry: &str) -> String {
    format!(
        r#"Analyze the current state of the {industry} industry and provide insights in ONLY the following JSON format without any additional notes or explanations:
{{
  "salaryRanges": [
    {{ "role": "string", "min": number, "max": number, "median": number, "location": "string" }}
  ],
  "growthRate": number,
  "demandLevel": "High" | "Medium" | "Low",
  "topSkills": ["skill1", "skill2"],
  "marketOutlook": "Positive" | "Neutral" | "Negative",
  "keyTrends": ["trend1", "trend2"],
  "recommendedSkills": ["skill1", "skill2"]
}}

IMPORTANT: Return ONLY the JSON. No additional text, notes, or markdown formatting.
Include at least {min} common roles for salary ranges.
Growth rate should be a percentage.
Include at least {min} skills and trends."#,
        industry = industry,
        min = MIN_LIST_ENTRIES,
    )
}
