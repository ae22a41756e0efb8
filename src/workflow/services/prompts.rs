//! Prompt templates, rendered with `minijinja`.

use minijinja::Environment;
use serde::Serialize;

use super::StageError;

/// Standing instructions for the planning and review model.
pub const LEAD_SYSTEM: &str = "\
You are an experienced project lead and technical architect. You analyse \
requirements, write detailed implementation plans, review code written by \
a junior developer and make technical decisions. Be thorough but concise \
and focus on actionable guidance.";

/// Standing instructions for the implementation model.
pub const MEMBER_SYSTEM: &str = "\
You are a senior software engineer. You have tools for reading, writing \
and listing files in the workspace and for running commands and code in a \
sandbox.

When given a task:
1. Understand the current code by reading relevant files
2. Plan your approach
3. Implement the solution using the tools
4. Test your changes
5. Report completion without calling any tool

Always use tools to accomplish the task. Paths are relative to the \
workspace root.";

/// Initial planning request.
pub const PLANNING: &str = "\
User request: {{ request }}

Create a detailed implementation plan that includes:
1. **Requirements analysis**: what needs to be built
2. **Technical approach**: how to implement it
3. **File changes**: which files need to be modified or created
4. **Testing strategy**: how to verify it works
5. **Success criteria**: how to know when it is complete

Be specific and actionable. The plan will be handed to a junior developer.";

/// Plan revision after requested changes.
pub const REVISION: &str = "\
The user reviewed your plan and requested changes.

Original request: {{ request }}

Original plan:
{{ plan }}

Requested changes:
{{ feedback }}

Provide a revised implementation plan addressing these changes.";

/// Implementation request.
pub const IMPLEMENTATION: &str = "\
Implement the following plan:

{{ plan }}
{% if feedback %}
Feedback on the previous attempt:
{{ feedback }}
{% endif %}
Follow the plan exactly. Report what you did when complete.";

/// Review request.
pub const REVIEW: &str = "\
Review this implementation by the junior developer.

Original plan:
{{ plan }}

Implementation result:
{{ implementation }}

As project lead, review:
1. Does it follow the plan?
2. Is the code quality acceptable?
3. Are there any issues or improvements needed?
4. Should we proceed to testing?

End with your decision: APPROVE or REQUEST_CHANGES.";

/// Renders `template` with `context`.
///
/// # Errors
///
/// Returns [`StageError::Template`] when the template does not render.
pub fn render(
    name: &'static str,
    template: &str,
    context: impl Serialize,
) -> Result<String, StageError> {
    Environment::new()
        .render_str(template, context)
        .map_err(|error| StageError::Template {
            name,
            reason: error.to_string(),
        })
}
