/*!

This is the long-form manual for `survey_metrics` and `jfce-survey`.

## Storage formats

The responses are stored as a table with one row per submission and one
column per field. The columns are looked up by name in the first row, so
their order does not matter, extra columns are ignored and missing columns
read as empty.

| column                     | content                                         |
|----------------------------|-------------------------------------------------|
| `timestamp`                | `YYYY-MM-DD HH:MM:SS[.ffffff]`, local time      |
| `respondent_id`            | unique id (UUID v4 for new submissions)         |
| `unidade`                  | unit                                            |
| `tipo_usuario`             | user type                                       |
| `atua_como`                | role (lawyers only, optional)                   |
| `faixa_idade`              | age band (optional)                             |
| `genero`                   | gender (optional)                               |
| `canal_contato_mais_usado` | contact channel                                 |
| `ja_usou_balcao_virtual`   | `Sim` / `Não`                                   |
| `ja_participou_audiencia`  | `Sim` / `Não`                                   |
| 8 dimension columns        | 1 to 5, see [`Dimension::key`](crate::Dimension::key) |
| `satisfacao_geral`         | 1 to 5                                          |
| `recomendacao_0_10`        | 0 to 10                                         |
| `comentario_aberto`        | free text, at most 500 characters               |

Scores that are empty, not numeric or out of range are read as missing and
left out of every mean and NPS. They never count as 0.

### `csv`

The default store. Every submission rewrites the whole file through a
temporary file that is then renamed over the original, so a failed write
leaves the previous content in place.

### `xlsx`

The Excel workbook used by the first version of the survey (`Dados.xlsx`,
worksheet `respostas`). It can be read and imported into the CSV store but
not written to.

## Metrics

- **NPS**: percentage of promoters (9 and 10) minus percentage of
  detractors (0 to 6). Passives (7 and 8) only count in the total.
- **Mean satisfaction**: mean of `satisfacao_geral`.
- **Recent window**: the last 30 days of the selection, counted back from
  its most recent response. The window never starts before the first
  response of the selection.
- **Targets**: a warning is raised when the recent mean satisfaction is below
  4.2, or the recent NPS is below 50.

## Configuration

`jfce-survey` reads an optional JSON configuration file:

```text
{
  "dataFile": "respostas.csv",
  "inputType": "csv",
  "excelWorksheetName": "respostas",
  "satisfactionTarget": 4.2,
  "npsTarget": 50,
  "timezone": "America/Sao_Paulo",
  "recentWindowDays": 30,
  "commentLimit": 50
}
```

All the keys are optional. The command line flags take precedence.

 */
