use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};
use thiserror::Error;
use tracing::info;

use crate::node::response::{DataFormat, ResponseDescriptor};
use crate::results::harvest::ResultTables;
use crate::results::table::{DataType, Table};

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Error writing table file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Error writing response: {0}")]
    Io(#[from] std::io::Error),
}

fn write_tsv<I>(path: &Path, headers: &[&str], rows: I) -> Result<(), AssembleError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Always)
        .from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_table(table: &Table, path: &Path) -> Result<(), AssembleError> {
    let rows = table
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.render()).collect());
    write_tsv(path, &table.headers(), rows)
}

/// Name of the connection table linking `table` to its parent.
pub fn connection_name(table: &Table) -> String {
    format!("{} to {}", table.kind(), table.kind().parent().0)
}

fn connection_path(out_dir: &Path, table: &Table) -> PathBuf {
    let (parent, _) = table.kind().parent();
    out_dir.join(format!("{}_{}.txt", table.kind().file_stem(), parent.replace(' ', "")))
}

/// Writes every harvested table and its connection table into `out_dir`
/// and describes them for Compound Discoverer.
pub fn assemble(results: &ResultTables, out_dir: &Path) -> Result<ResponseDescriptor, AssembleError> {
    let mut response = ResponseDescriptor::default();

    for table in &results.tables {
        let kind = table.kind();
        let name = kind.to_string();

        let data_path = out_dir.join(format!("{}.txt", kind.file_stem()));
        write_table(table, &data_path)?;
        response.add_table(&name, &data_path, DataFormat::Csv, BTreeMap::new());
        for column in table.schema.columns {
            response.add_column(&name, column.name, column.data_type, column.id);
            if let Some(position) = column.position {
                response.set_column_option(&name, column.name, "RelativePosition", &position.to_string());
            }
            if let Some(format) = column.format {
                response.set_column_option(&name, column.name, "FormatString", format);
            }
        }

        let (parent, parent_column) = kind.parent();
        let own_column = kind.id_column();
        let connection = connection_name(table);
        let connection_path = connection_path(out_dir, table);
        let links = table
            .connections()
            .into_iter()
            .map(|(own, parent)| vec![own.to_string(), parent.to_string()]);
        write_tsv(&connection_path, &[own_column.as_str(), parent_column.as_str()], links)?;

        let options = BTreeMap::from([
            ("FirstTable".to_string(), name.clone()),
            ("SecondTable".to_string(), parent),
        ]);
        response.add_table(&connection, &connection_path, DataFormat::CsvConnectionTable, options);
        response.add_column(&connection, &own_column, DataType::Int, true);
        response.add_column(&connection, &parent_column, DataType::Int, true);

        info!(table = %name, rows = table.len(), file = %data_path.display(), "Wrote result table");
    }

    Ok(response)
}
