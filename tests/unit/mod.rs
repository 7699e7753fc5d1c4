mod column_resolution;
