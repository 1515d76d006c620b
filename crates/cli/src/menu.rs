//! Interactive menu driving an in-process model
//!
//! The model lives for the whole session: load, reconfigure, train and
//! evaluate are separate steps, and nothing is persisted until the user saves.

use crate::commands::predict::parse_pixels;
use crate::output::{color_accuracy, confusion_table, params_table, result_table};
use anyhow::Result;
use colored::Colorize;
use digits_lib::{ClassificationModel, DataSource, ParamsUpdate, Repository};
use std::io::{BufRead, Write};
use std::sync::Arc;

const RULE: &str = "============================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    LoadData,
    ChangeParams,
    Train,
    Evaluate,
    Predict,
    Save,
    Exit,
}

impl MenuOption {
    const ALL: [(MenuOption, &'static str); 7] = [
        (MenuOption::LoadData, "Load the digits dataset"),
        (MenuOption::ChangeParams, "Change model parameters"),
        (MenuOption::Train, "Train the model"),
        (MenuOption::Evaluate, "Evaluate and show results"),
        (MenuOption::Predict, "Predict a digit"),
        (MenuOption::Save, "Save the model"),
        (MenuOption::Exit, "Exit"),
    ];

    /// Parse a 1-based menu choice
    pub fn parse(choice: &str) -> Option<Self> {
        let index: usize = choice.trim().parse().ok()?;
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .map(|(option, _)| *option)
    }
}

pub struct Menu<R, W> {
    input: R,
    output: W,
    model: ClassificationModel,
    source: Arc<dyn DataSource>,
    repository: Arc<dyn Repository>,
    running: bool,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    pub fn new(
        input: R,
        output: W,
        source: Arc<dyn DataSource>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            input,
            output,
            model: ClassificationModel::new(),
            source,
            repository,
            running: false,
        }
    }

    pub fn model(&self) -> &ClassificationModel {
        &self.model
    }

    /// Run until the user exits or input ends
    pub fn run(&mut self) -> Result<()> {
        self.running = true;
        writeln!(self.output, "{}", RULE)?;
        writeln!(self.output, "{:^60}", "Handwritten Digit Recognition")?;
        writeln!(self.output, "{}", RULE)?;

        if let Err(e) = self.load_data() {
            self.show_error(&e)?;
        }

        while self.running {
            let Some(option) = self.choose()? else {
                break;
            };
            if let Err(e) = self.handle(option) {
                self.show_error(&e)?;
            }
        }

        writeln!(self.output, "{}", RULE)?;
        writeln!(self.output, "{:^60}", "Goodbye!")?;
        writeln!(self.output, "{}", RULE)?;
        Ok(())
    }

    /// Show the menu until a valid option is entered; `None` at end of input
    fn choose(&mut self) -> Result<Option<MenuOption>> {
        loop {
            writeln!(self.output, "*** Menu: choose an option")?;
            for (index, (_, label)) in MenuOption::ALL.iter().enumerate() {
                writeln!(self.output, "\t{}. {}", index + 1, label)?;
            }
            let Some(line) = self.prompt(":> ")? else {
                return Ok(None);
            };
            match MenuOption::parse(&line) {
                Some(option) => return Ok(Some(option)),
                None => writeln!(self.output, "\n** Invalid option, try again. **\n")?,
            }
        }
    }

    fn handle(&mut self, option: MenuOption) -> Result<()> {
        match option {
            MenuOption::LoadData => self.load_data(),
            MenuOption::ChangeParams => self.change_params(),
            MenuOption::Train => self.train(),
            MenuOption::Evaluate => self.evaluate(),
            MenuOption::Predict => self.predict(),
            MenuOption::Save => self.save(),
            MenuOption::Exit => {
                self.running = false;
                Ok(())
            }
        }
    }

    fn load_data(&mut self) -> Result<()> {
        self.model.load(self.source.as_ref())?;
        let dataset = self.model.dataset();
        let message = format!(
            "Dataset loaded: {} records, {} features",
            dataset.total_records(),
            dataset.feature_count()
        );
        self.show_message(&message)
    }

    /// Prompt for every parameter; a blank answer keeps the current value
    fn change_params(&mut self) -> Result<()> {
        writeln!(self.output, "{}", params_table(self.model.params()))?;
        let update = ParamsUpdate {
            seed: self.prompt_value("Random seed")?,
            test_size: self.prompt_value("Test size (0-1)")?,
            k_neighbors: self.prompt_value("Number of neighbors (k)")?,
            k_fold: self.prompt_value("Cross-validation folds (0 disables)")?,
        };
        if update.is_empty() {
            return self.show_message("Parameters unchanged");
        }
        self.model.configure(&update)?;
        self.show_message("Parameters changed successfully")
    }

    fn train(&mut self) -> Result<()> {
        self.show_message("Training the model...")?;
        self.model.train()?;
        self.show_message("Model trained successfully")
    }

    fn evaluate(&mut self) -> Result<()> {
        self.show_message("Evaluating the model...")?;
        let result = self.model.evaluate()?.clone();
        writeln!(self.output, "{}", result_table(&result))?;
        writeln!(self.output, "{}", confusion_table(&result))?;
        writeln!(
            self.output,
            "{} {}",
            "Accuracy:".bold(),
            color_accuracy(result.accuracy)
        )?;
        Ok(())
    }

    fn predict(&mut self) -> Result<()> {
        let Some(line) = self.prompt("Pixels (64 comma-separated values): ")? else {
            return Ok(());
        };
        for (index, sample) in parse_pixels(&line)?.iter().enumerate() {
            let label = self.model.predict(sample)?;
            self.show_message(&format!("Sample {}: predicted digit {}", index + 1, label))?;
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.repository.store(&self.model.bundle()?)?;
        self.show_message("Model saved successfully")
    }

    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt_value<T: std::str::FromStr>(&mut self, label: &str) -> Result<Option<T>> {
        loop {
            let Some(line) = self.prompt(&format!("{}: ", label))? else {
                return Ok(None);
            };
            if line.is_empty() {
                return Ok(None);
            }
            match line.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => writeln!(self.output, "** {:?} is not a valid number **", line)?,
            }
        }
    }

    fn show_message(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "\n*** {} ***\n", message)?;
        Ok(())
    }

    fn show_error(&mut self, err: &anyhow::Error) -> Result<()> {
        writeln!(self.output, "\n{} {}\n", "Error:".red().bold(), err)?;
        Ok(())
    }
}
