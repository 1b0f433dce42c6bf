//! Extra procedural guidance appended to the system prompt for tasks that
//! match a known workflow.

pub trait WorkflowPolicy: Send + Sync {
    fn guidance(&self, task: &str) -> Option<String>;
}

/// Never adds guidance.
pub struct NoWorkflow;

impl WorkflowPolicy for NoWorkflow {
    fn guidance(&self, _task: &str) -> Option<String> {
        None
    }
}

/// A workflow enabled when the task mentions any of its triggers.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub triggers: Vec<String>,
    pub steps: Vec<String>,
    pub notes: Vec<String>,
}

impl Workflow {
    fn matches(&self, task_lower: &str) -> bool {
        self.triggers
            .iter()
            .any(|t| task_lower.contains(&t.to_lowercase()))
    }

    fn render(&self) -> String {
        let mut out = format!("\n\n=== {} WORKFLOW ===\n", self.name.to_uppercase());
        out.push_str("Follow these steps in order. Find the actual coordinates from the screenshot for each step:\n\n");
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("STEP {}: {}\n", i + 1, step));
        }
        if !self.notes.is_empty() {
            out.push_str("\nIMPORTANT:\n");
            for note in &self.notes {
                out.push_str(&format!("- {note}\n"));
            }
        }
        out
    }
}

/// Substring-triggered workflows; the first match wins.
pub struct KeywordWorkflow {
    workflows: Vec<Workflow>,
}

impl KeywordWorkflow {
    pub fn new(workflows: Vec<Workflow>) -> Self {
        Self { workflows }
    }
}

impl Default for KeywordWorkflow {
    fn default() -> Self {
        Self::new(vec![product_configurator()])
    }
}

impl WorkflowPolicy for KeywordWorkflow {
    fn guidance(&self, task: &str) -> Option<String> {
        let lower = task.to_lowercase();
        self.workflows
            .iter()
            .find(|w| w.matches(&lower))
            .map(Workflow::render)
    }
}

fn product_configurator() -> Workflow {
    let s = |text: &str| text.to_string();
    Workflow {
        name: s("ThinkPad X1 Carbon configurator"),
        triggers: vec![s("thinkpad"), s("x1 carbon")],
        steps: vec![
            s("Find the Memory/RAM section and select the RAM option the task asks for."),
            s("Find the Storage/SSD section and select the storage option the task asks for."),
            s("Find the Warranty/Support section and select the warranty the task asks for."),
            s("Find the quantity field (may be labeled 'Qty' or 'Quantity'), click it and type the requested quantity."),
            s("Click the 'Add to Cart' button. It may be labeled 'Add to Cart', 'Add to Bag' or 'Add'."),
            s("Wait for the page to update, then read the final price (labeled 'Total', 'Price', 'Your Price' or 'Cart Total')."),
        ],
        notes: vec![
            s("Skip any step the task does not mention."),
            s("Scroll down if needed to find each section."),
            s("Wait for dropdowns/options to appear after clicking."),
            s("When done, use the 'done' action with a result containing the price, quantity and status."),
        ],
    }
}
