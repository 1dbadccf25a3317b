//! Prompt assembly for task resolution and branch selection.

use crate::core::{ReasoningHint, TaskNode};
use crate::oracle::{OracleRequest, OutputShape, SystemRole};

const GRAPH_FORMAT: &str = r#"The graph MUST be a JSON object that contains the following keys:
    "start": The id of the node the plan starts from.
    "nodes": All the graph's nodes. The nodes represent subtasks that you will take. Each node is a JSON object with an "id" key holding a short human-readable name of the subtask, and a "description" key that describes the subtask in more detail than the "id" (one sentence at most). Each node must include its reasoning type "type": "direct" for tasks computed in one step, "decompose" for tasks that need multiple steps. If a node is a conditional node (only one of its next steps should run), add the key "conditional": true to it. The graph MUST NOT contain a "START" node. The graph MUST contain an "END" node that marks the termination of the plan.
    "edges": All the graph's edges. Each edge is an object with a "source" and a "target" node id; the ids must match the node ids you define. If an edge is conditional, add the key "condition" describing, as a string, when the target should run."#;

const ANSWER_FORMAT: &str = r#"You MUST return a pure JSON object that contains the key "answer" whose value is the actual answer. It cannot be ambiguous, and it cannot be another task. It must be a clear returned value."#;

/// Instruction matching a task's reasoning hint.
pub fn task_instruction(hint: ReasoningHint) -> String {
    match hint {
        ReasoningHint::Unset => format!(
            "You must choose ONE from the following:\n\n\
             Option 1: Evaluate if you can directly satisfy the goal (GOAL) by reviewing the state history (STATE HISTORY) above. If you can achieve this without additional computations, {}\n\
             Option 2: If the state history (STATE HISTORY) does not provide sufficient information to directly satisfy the goal (GOAL), create a graph in JSON format that outlines the plan you will use to achieve the goal, given the current state history (STATE HISTORY). {}",
            lowercase_first(ANSWER_FORMAT),
            GRAPH_FORMAT
        ),
        ReasoningHint::Direct => format!(
            "Use the provided state history (STATE HISTORY) to achieve the goal (GOAL). {}",
            ANSWER_FORMAT
        ),
        ReasoningHint::Decompose => format!(
            "Create a graph in JSON format that outlines the plan you will use to achieve the goal (GOAL), given the current state history (STATE HISTORY). Do NOT answer directly. {}",
            GRAPH_FORMAT
        ),
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Prompt asking the oracle to resolve `task` given the ledger transcript.
pub fn resolution_prompt(task: &TaskNode, transcript: &str) -> String {
    format!(
        "You will be presented with the following:

- State History (STATE HISTORY): A list of all previously taken steps along with their returned values.
- Goal (GOAL): A goal you MUST achieve.
- Goal Description (GOAL DESCRIPTION): A more detailed description of the goal (GOAL).
- Task (TASK): A task to perform given the full state history (STATE HISTORY) and the goal (GOAL).

Here is the information:

STATE HISTORY
{transcript}

GOAL
{goal}

GOAL DESCRIPTION
{description}

TASK
{instruction}
If you create a graph, do not create nodes for steps already in the state history (STATE HISTORY). The nodes cannot contain the following node: {goal}
",
        transcript = transcript,
        goal = task.goal,
        description = task.description,
        instruction = task_instruction(task.hint),
    )
}

/// Format successor candidates with their branch conditions.
pub fn format_candidates(candidates: &[(String, Option<String>)]) -> String {
    candidates
        .iter()
        .map(|(name, condition)| {
            format!(
                "Task Name: {}\nCondition: {}",
                name,
                condition.as_deref().unwrap_or("none")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking the oracle which successor of a conditional task runs next.
pub fn selection_prompt(transcript: &str, candidates: &[(String, Option<String>)]) -> String {
    format!(
        "Given the following state history (STATE HISTORY) of the steps taken along with their outputs, and the following potential next steps (POTENTIAL NEXT STEPS), pick the next step whose condition matches the state history (STATE HISTORY):

STATE HISTORY
{transcript}

POTENTIAL NEXT STEPS
{candidates}

OUTPUT FORMAT (JSON)
Your output MUST be a JSON object that contains the following key:
    \"next_task_name\": The exact task name of the next task that you pick based on the state history (STATE HISTORY).
",
        transcript = transcript,
        candidates = format_candidates(candidates),
    )
}

/// Structured request resolving `task` against its current ledger.
pub fn resolution_request(task: &TaskNode) -> OracleRequest {
    let transcript = task.ledger().transcript();
    OracleRequest::new(
        &task.name,
        task.role,
        resolution_prompt(task, &transcript),
        OutputShape::StructuredJson,
    )
}

/// Structured request picking the successor of conditional `task`.
pub fn selection_request(task: &TaskNode, candidates: &[(String, Option<String>)]) -> OracleRequest {
    let transcript = task.ledger().transcript();
    OracleRequest::new(
        &task.name,
        SystemRole::Planner,
        selection_prompt(&transcript, candidates),
        OutputShape::StructuredJson,
    )
}
